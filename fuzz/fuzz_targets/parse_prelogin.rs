#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_wire::PreLogin;

fuzz_target!(|data: &[u8]| {
    if let Ok(prelogin) = PreLogin::decode(data) {
        let _ = prelogin.expects_tls();
    }
});
