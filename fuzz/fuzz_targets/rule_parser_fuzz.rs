//! Rule parser fuzz target: arbitrary text must parse or fail with a SyntaxError, and every
//! accepted rule must re-parse from its canonical rendering.
//! Build with: cargo fuzz run rule_parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(rule) = wirerule::parse(s) {
        let rendered = rule.render();
        let again = wirerule::parse(&rendered).expect("canonical rendering must parse");
        assert_eq!(again.render(), rendered);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run rule_parser_fuzz");
}
