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

use libfuzzer_sys::fuzz_target;
use raintree_overlay::core::envelope::Envelope;

// Arbitrary bytes must never panic on decode, and a successful decode must
// always re-encode to something decode accepts again.
fuzz_target!(|data: &[u8]| {
    if let Ok(env) = Envelope::decode(data, 16 * 1024 * 1024) {
        let re_encoded = env.encode();
        let round_tripped = Envelope::decode(&re_encoded, 16 * 1024 * 1024).expect("re-encode must decode");
        assert_eq!(env, round_tripped);
    }
});
