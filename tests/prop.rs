use aytf::as_you_type::AsYouTypeFormatter;
use aytf::metadata::DATABASE;
use proptest::prelude::*;

fn diallable_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect()
}

fn type_all(region: &str, input: &str) -> String {
    let mut formatter = AsYouTypeFormatter::new(&DATABASE, region);
    let mut output = String::new();

    for ch in input.chars() {
        output = formatter.input_digit(ch).to_owned();
    }

    output
}

proptest! {
    #[test]
    fn doesnt_panic(region in "[A-Z]{2}", s in "\\PC{0,64}") {
        let _ = type_all(&region, &s);
    }

    /// Invariant 1: no digit (or leading '+') typed is ever lost or reordered.
    #[test]
    fn never_drops_a_digit(digits in "[0-9+]{1,20}") {
        let mut formatter = AsYouTypeFormatter::new(&DATABASE, "US");
        let mut typed_digits = String::new();

        for ch in digits.chars() {
            typed_digits.push(ch);
            let output = formatter.input_digit(ch).to_owned();
            prop_assert_eq!(diallable_digits(&output), diallable_digits(&typed_digits));
        }
    }

    /// If any submitted character is disqualifying, the output is forever the
    /// verbatim concatenation of everything submitted.
    #[test]
    fn disqualified_input_echoes_verbatim(prefix in "[0-9]{0,6}", garbage in "[^0-9+]{1,4}", suffix in "[0-9]{0,6}") {
        let mut formatter = AsYouTypeFormatter::new(&DATABASE, "US");
        let mut typed = String::new();
        let mut output = String::new();

        for ch in prefix.chars().chain(garbage.chars()).chain(suffix.chars()) {
            typed.push(ch);
            output = formatter.input_digit(ch).to_owned();
        }

        prop_assert_eq!(output, typed);
    }

    /// Clear() followed by the same input sequence reproduces the same final
    /// output as a fresh formatter.
    #[test]
    fn clear_resets_to_fresh_state(region in "US|GB|DE|FR|BY", digits in "[0-9]{1,15}") {
        let mut formatter = AsYouTypeFormatter::new(&DATABASE, &region);
        formatter.input_digit('5');
        formatter.input_digit('5');
        formatter.clear();

        let mut after_clear = String::new();
        for ch in digits.chars() {
            after_clear = formatter.input_digit(ch).to_owned();
        }

        let fresh = type_all(&region, &digits);

        prop_assert_eq!(after_clear, fresh);
    }

    /// The remembered position is always within bounds.
    #[test]
    fn remembered_position_stays_in_bounds(digits in "[0-9]{1,15}", remember_at in 0usize..15) {
        let mut formatter = AsYouTypeFormatter::new(&DATABASE, "US");
        let mut last_output = String::new();
        let target = remember_at.min(digits.chars().count().saturating_sub(1));

        for (index, ch) in digits.chars().enumerate() {
            last_output = if index == target {
                formatter.input_digit_and_remember_position(ch).to_owned()
            } else {
                formatter.input_digit(ch).to_owned()
            };
        }

        let position = formatter.remembered_position();
        prop_assert!(position <= last_output.chars().count());
    }
}
