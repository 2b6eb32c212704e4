#![no_main]

use libfuzzer_sys::fuzz_target;
use squish::{Algorithm, Compression, Middleware};
use std::io::{self, Read};

fuzz_target!(|data: &[u8]| {
    for algorithm in Algorithm::ALL {
        let mut r = match Compression::new(algorithm).reader(data) {
            Ok(r) => r,
            Err(_) => continue,
        };

        let mut buf = [0u8; 4096];
        loop {
            match r.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => (),
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => (),
                Err(_) => break,
            }
        }
    }
});
