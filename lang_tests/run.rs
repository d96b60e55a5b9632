use std::{env, fs::read_to_string, path::PathBuf, process::Command};

use lang_tester::LangTester;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

lazy_static! {
    // The expected outcome is the leading `/* ... */` comment block.
    static ref EXPECTED: Regex = RegexBuilder::new(r"^/\*(.*?)\*/")
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
        .unwrap();
}

fn main() {
    LangTester::new()
        .test_dir("lang_tests")
        .test_path_filter(|p| p.extension().and_then(|x| x.to_str()) == Some("jack"))
        .test_extract(|p| {
            let s = read_to_string(p).unwrap();
            EXPECTED
                .captures(&s)
                .map(|x| x.get(1).unwrap().as_str().trim().to_owned())
                .unwrap()
        })
        .test_cmds(|p| {
            // We call target/[debug|release]/jackal directly, because it's
            // noticeably faster than calling `cargo run`.
            let mut jackal_bin = PathBuf::new();
            jackal_bin.push(env::var("CARGO_MANIFEST_DIR").unwrap());
            jackal_bin.push("target");
            #[cfg(debug_assertions)]
            jackal_bin.push("debug");
            #[cfg(not(debug_assertions))]
            jackal_bin.push("release");
            jackal_bin.push("jackal");
            let mut compiler = Command::new(jackal_bin);
            compiler.args(&[p.to_str().unwrap()]);
            vec![("Compiler", compiler)]
        })
        .run();
}
