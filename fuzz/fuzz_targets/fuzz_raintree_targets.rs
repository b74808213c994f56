// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use raintree_overlay::networking::raintree::{effective_k, tree_height};

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    n: u16,
    self_index: u16,
    depth: u8,
}

// For any validator-set size and any depth, k(d) must stay in [1, n] and
// the derived target offsets must stay within [0, n) — no panics, no
// out-of-range arithmetic, regardless of how self_index/depth are chosen.
fuzz_target!(|inp: Input| {
    let n = (inp.n as usize) % 4096 + 1;
    let height = tree_height(n);
    let depth = (inp.depth as u32) % (height + 2);
    let self_index = (inp.self_index as usize) % n;

    let k = effective_k(n, depth, height);
    assert!(k >= 1);
    assert!(k <= n);

    if k > 1 {
        let left = (self_index + k / 3) % n;
        let right = (self_index + (2 * k) / 3) % n;
        assert!(left < n);
        assert!(right < n);
    }
});
