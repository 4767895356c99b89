// Copyright (C) 2017 1aim GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Formats a phone number incrementally as the user types it, the way a
//! dialer UI would.
//!
//! This mirrors the behaviour of Google's `AsYouTypeFormatter`: every digit
//! (or punctuation character) fed in produces the best-effort formatting of
//! everything accrued so far, re-evaluating the international prefix,
//! country calling code, national prefix and number format as more digits
//! arrive.

use regex::Regex;
use regex_cache::{CachedRegex, CachedRegexBuilder};

use crate::consts;
use crate::metadata::{Database, Descriptor, Descriptors, Format, Metadata, DATABASE};

/// The minimum length of national number accrued that is required to trigger
/// the formatter. The first element of a format's `leading_digits` patterns
/// matches up to this number of digits.
const MIN_LEADING_DIGITS_LENGTH: usize = 3;

/// The digit placeholder used while building a formatting template. `U+2008`
/// (punctuation space) is used because it is extremely unlikely to appear in
/// user input, the same choice libphonenumber makes.
const DIGIT_PLACEHOLDER: char = '\u{2008}';

/// Character used to separate a prefix, such as a long NDD or a country
/// calling code, from the national number.
const SEPARATOR_BEFORE_NATIONAL_NUMBER: char = ' ';

/// A stand-in national number used to probe a format's pattern for the
/// longest prefix it can cover.
const ALL_NINES: &str = "999999999999999";

lazy_static! {
    /// A format is only usable for as-you-type formatting if, once `$NP`/`$FG`
    /// placeholders are gone, it still only contains digit groups, spaces and a
    /// limited set of punctuation.
    static ref ELIGIBLE_FORMAT_PATTERN: Regex =
        Regex::new(&format!("[{0}]*(\\$\\d[{0}]*)+", *consts::VALID_PUNCTUATION)).unwrap();

    /// Characters that, if found in a national-prefix-formatting rule,
    /// indicate that a space should separate the national prefix from the
    /// rest of the number when formatting.
    static ref NATIONAL_PREFIX_SEPARATORS_PATTERN: Regex = Regex::new(r"[- ]").unwrap();
}

/// Build a neutral, never-matching [`Metadata`] to fall back on when no
/// region-specific metadata is available (unknown/invalid region code, or a
/// region not present in the loaded [`Database`]).
fn empty_metadata(database: &Database) -> Metadata {
    let unmatchable =
        |source: &str| -> CachedRegex { CachedRegexBuilder::new(database.cache(), source).build_unchecked() };

    Metadata {
        descriptors: Descriptors {
            general: Descriptor {
                national_number: unmatchable("NA"),
                possible_length: Vec::new(),
                possible_local_length: Vec::new(),
                example: None,
            },
            fixed_line: None,
            mobile: None,
            toll_free: None,
            premium_rate: None,
            shared_cost: None,
            personal_number: None,
            voip: None,
            pager: None,
            uan: None,
            emergency: None,
            voicemail: None,
            short_code: None,
            standard_rate: None,
            carrier: None,
            no_international: None,
        },

        id: consts::UNKNOWN_REGION.into(),
        country_code: 0,

        international_prefix: Some(unmatchable("NA")),
        preferred_international_prefix: None,
        national_prefix: None,
        preferred_extension_prefix: None,
        national_prefix_for_parsing: None,
        national_prefix_transform_rule: None,

        formats: Vec::new(),
        international_formats: Vec::new(),

        main_country_for_code: false,
        leading_digits: None,
        mobile_number_portable: false,
    }
}

/// Load the metadata a freshly constructed formatter should start with for
/// `region_code`: the region's own metadata if known, otherwise
/// [`empty_metadata`].
fn metadata_for_region_code(database: &Database, region_code: &str) -> Metadata {
    database.by_id(region_code).cloned().unwrap_or_else(|| empty_metadata(database))
}

/// Peel country-calling-code digits off the front of `national_number`, the
/// way full parsing does, but without requiring a complete, valid number:
/// try every calling-code length up to
/// [`consts::MAX_LENGTH_FOR_COUNTRY_CODE`], and take the first one present in
/// `database`.
///
/// Returns `(0, national_number)` unchanged if no calling code could be
/// identified, playing the role of the external `extractCountryCode`
/// collaborator described in the formatter's interface.
fn extract_country_code(database: &Database, national_number: &str) -> (u16, String) {
    if national_number.is_empty() || national_number.starts_with('0') {
        return (0, national_number.into());
    }

    for len in 1..=consts::MAX_LENGTH_FOR_COUNTRY_CODE {
        if len > national_number.len() {
            break;
        }

        if let Ok(code) = national_number[..len].parse::<u16>() {
            if database.by_code(&code).is_some() {
                return (code, national_number[len..].into());
            }
        }
    }

    (0, national_number.into())
}

/// Whether `rule` (a national-prefix-formatting-rule) mentions only the
/// first captured group, i.e. does not render the national prefix itself.
fn is_first_group_only_prefix(rule: Option<&str>) -> bool {
    match rule {
        None => true,
        Some(rule) => consts::FIRST_GROUP_ONLY_PREFIX.is_match(rule),
    }
}

/// Drop every character from `text` that is not essential for dialling
/// (digits, `+`, `*`, `#`), the way the full parsing pipeline's diallable
/// normalization does.
fn diallable_chars_only(text: &str) -> String {
    text.chars().filter_map(|c| consts::DIALLABLE_CHAR_MAPPINGS.get(&c).copied()).collect()
}

/// Map one raw input character to the decimal digit it represents; returns
/// `None` for anything that is not a digit. Alphabetic dial-pad letters are
/// not digits here: that mapping belongs to the full-parse pipeline, not the
/// as-you-type formatter, which must treat a letter as disqualifying input.
fn normalize_char(ch: char) -> Option<char> {
    use crate::digit::AsCharExt;

    if ch.is_ascii_digit() {
        return Some(ch);
    }

    ch.as_dec_digit()
}

fn same_metadata(a: &Metadata, b: &Metadata) -> bool {
    a.id == b.id && a.country_code == b.country_code
}

/// Formats a phone number one character at a time, producing the best
/// rendering of the digits seen so far.
///
/// Construct with [`AsYouTypeFormatter::new`] or
/// [`AsYouTypeFormatter::with_region`], then feed characters one by one with
/// [`input_digit`](Self::input_digit).
pub struct AsYouTypeFormatter<'d> {
    database: &'d Database,

    default_region: String,
    default_metadata: Metadata,
    current_metadata: Metadata,

    /// Everything typed so far, verbatim.
    accrued_input: String,
    /// `accrued_input`, with formatting punctuation dropped, alphabetic
    /// characters mapped to their dial-pad digit, and at most a single
    /// leading `+` retained.
    accrued_digits: String,

    /// The national significant number accrued so far (IDD, country code and
    /// national prefix already stripped where identified).
    national_number: String,
    /// Everything that should be rendered before `national_number`: any
    /// `+`/IDD, country-code text, extracted national prefix, and the
    /// separators between them.
    prefix_before_national_number: String,
    extracted_national_prefix: String,

    able_to_format: bool,
    input_has_formatting: bool,
    is_complete_number: bool,
    is_expecting_country_code: bool,
    should_add_space_after_national_prefix: bool,

    possible_formats: Vec<Format>,
    formatting_template: Vec<char>,
    last_match_position: usize,
    current_formatting_pattern: String,

    current_output: String,

    position_to_remember: usize,
    original_position: usize,
}

impl<'d> AsYouTypeFormatter<'d> {
    /// Create a formatter defaulting to `region_code` when the user does not
    /// type a leading `+`. An unrecognized region code falls back to empty
    /// metadata, so only the `+`-leading path will ever produce formatted
    /// (rather than raw) output.
    pub fn new(database: &'d Database, region_code: &str) -> Self {
        let default_metadata = metadata_for_region_code(database, region_code);

        AsYouTypeFormatter {
            database,
            default_region: region_code.into(),
            current_metadata: default_metadata.clone(),
            default_metadata,

            accrued_input: String::new(),
            accrued_digits: String::new(),

            national_number: String::new(),
            prefix_before_national_number: String::new(),
            extracted_national_prefix: String::new(),

            able_to_format: true,
            input_has_formatting: false,
            is_complete_number: false,
            is_expecting_country_code: false,
            should_add_space_after_national_prefix: false,

            possible_formats: Vec::new(),
            formatting_template: Vec::new(),
            last_match_position: 0,
            current_formatting_pattern: String::new(),

            current_output: String::new(),

            position_to_remember: 0,
            original_position: 0,
        }
    }

    /// Create a formatter using the global [`DATABASE`] for metadata lookup.
    pub fn with_region(region_code: &str) -> AsYouTypeFormatter<'static> {
        AsYouTypeFormatter::new(&DATABASE, region_code)
    }

    /// Reset the formatter to a fresh, empty state, keeping the default
    /// region it was created with.
    pub fn clear(&mut self) {
        self.accrued_input.clear();
        self.accrued_digits.clear();
        self.national_number.clear();
        self.prefix_before_national_number.clear();
        self.extracted_national_prefix.clear();

        self.able_to_format = true;
        self.input_has_formatting = false;
        self.is_complete_number = false;
        self.is_expecting_country_code = false;
        self.should_add_space_after_national_prefix = false;

        self.possible_formats.clear();
        self.formatting_template.clear();
        self.last_match_position = 0;
        self.current_formatting_pattern.clear();

        self.current_output.clear();

        self.position_to_remember = 0;
        self.original_position = 0;

        if same_metadata(&self.current_metadata, &self.default_metadata) {
            self.current_metadata = metadata_for_region_code(self.database, &self.default_region);
        }
    }

    /// The national prefix (NDD) that has been extracted so far, empty if
    /// none.
    pub fn extracted_national_prefix(&self) -> &str {
        &self.extracted_national_prefix
    }

    /// The position, within the most recently returned output, of the
    /// character tracked by the last call to
    /// [`input_digit_and_remember_position`](Self::input_digit_and_remember_position).
    ///
    /// If formatting has been abandoned, this instead returns the raw
    /// (`accrued_input`) offset recorded at that time.
    pub fn remembered_position(&self) -> usize {
        if !self.able_to_format {
            return self.original_position;
        }

        let digits: Vec<char> = self.accrued_digits.chars().collect();
        let output: Vec<char> = self.current_output.chars().collect();

        let mut digit_index = 0;
        let mut output_index = 0;

        while digit_index < self.position_to_remember && output_index < output.len() {
            if digits.get(digit_index) == Some(&output[output_index]) {
                digit_index += 1;
            }
            output_index += 1;
        }

        output_index
    }

    /// Feed one more character (digit, `+`, or formatting punctuation) in
    /// and return the best-effort formatted rendering of everything entered
    /// so far.
    pub fn input_digit(&mut self, next_char: char) -> &str {
        self.current_output = self.input_digit_with_option_to_remember_position(next_char, false);
        &self.current_output
    }

    /// Like [`input_digit`](Self::input_digit), but also remembers where
    /// `next_char` ends up in the returned string, retrievable afterwards
    /// with [`remembered_position`](Self::remembered_position).
    pub fn input_digit_and_remember_position(&mut self, next_char: char) -> &str {
        self.current_output = self.input_digit_with_option_to_remember_position(next_char, true);
        &self.current_output
    }

    fn input_digit_with_option_to_remember_position(&mut self, next_char: char, remember_position: bool) -> String {
        self.accrued_input.push(next_char);

        if remember_position {
            self.original_position = self.accrued_input.chars().count();
        }

        if self.is_digit_or_leading_plus_sign(next_char) {
            self.normalize_and_accrue_digits_and_plus_sign(next_char, remember_position);
        } else {
            self.able_to_format = false;
            self.input_has_formatting = true;
        }

        if !self.able_to_format {
            // When we are unable to format for reasons other than that
            // formatting characters have been entered, it can be because of
            // a really long IDD or NDD. If so we might be able to format
            // again after extracting them.
            if self.input_has_formatting {
                return self.accrued_input.clone();
            } else if self.attempt_to_extract_idd() {
                if self.attempt_to_extract_country_code() {
                    return self.attempt_to_choose_pattern_with_prefix_extracted();
                }
            } else if self.able_to_extract_longer_ndd() {
                // Add an additional space to separate the long NDD from the
                // national significant number for readability. We do not
                // set should_add_space_after_national_prefix, since we do
                // not want this to change later when a new template is
                // chosen.
                self.prefix_before_national_number.push(SEPARATOR_BEFORE_NATIONAL_NUMBER);
                return self.attempt_to_choose_pattern_with_prefix_extracted();
            }
            return self.accrued_input.clone();
        }

        match self.accrued_digits.chars().count() {
            0 | 1 | 2 => self.accrued_input.clone(),

            3 => {
                if self.attempt_to_extract_idd() {
                    self.is_expecting_country_code = true;
                } else {
                    // No IDD or plus sign found; might be entering a
                    // national-format number.
                    self.extracted_national_prefix = self.remove_national_prefix_from_national_number();
                    return self.attempt_to_choose_formatting_pattern();
                }
                self.continue_formatting(next_char)
            }

            _ => self.continue_formatting(next_char),
        }
    }

    /// The "default" case of the per-character state machine: handles a
    /// country code still expected from an IDD, digits being fed into an
    /// already-chosen set of candidate formats, or falls back to choosing
    /// formats from scratch.
    fn continue_formatting(&mut self, next_char: char) -> String {
        if self.is_expecting_country_code {
            if self.attempt_to_extract_country_code() {
                self.is_expecting_country_code = false;
            }
            return format!("{}{}", self.prefix_before_national_number, self.national_number);
        }

        if !self.possible_formats.is_empty() {
            let digit = normalize_char(next_char).unwrap_or(next_char);
            let tentative = self.input_digit_helper(digit);

            if let Some(formatted) = self.attempt_to_format_accrued_digits() {
                return formatted;
            }

            self.narrow_down_possible_formats();

            if self.maybe_create_new_template() {
                return self.input_accrued_national_number();
            }

            if self.able_to_format {
                self.append_national_number(&tentative)
            } else {
                self.accrued_input.clone()
            }
        } else {
            self.attempt_to_choose_formatting_pattern()
        }
    }

    fn is_digit_or_leading_plus_sign(&self, ch: char) -> bool {
        normalize_char(ch).is_some() || (self.accrued_input.chars().count() == 1 && ch == consts::PLUS_SIGN)
    }

    /// Accrue `next_char` into `accrued_digits` (and `national_number`, for
    /// digits), normalizing non-ASCII digits to ASCII 0-9 along the way.
    fn normalize_and_accrue_digits_and_plus_sign(&mut self, next_char: char, remember_position: bool) {
        if next_char == consts::PLUS_SIGN {
            self.accrued_digits.push(next_char);
        } else {
            let normalized = normalize_char(next_char).unwrap_or(next_char);
            self.accrued_digits.push(normalized);
            self.national_number.push(normalized);
        }

        if remember_position {
            self.position_to_remember = self.accrued_digits.chars().count();
        }
    }

    /// Peel off the IDD (international direct-dialling prefix) or a leading
    /// `+` if present at the start of `accrued_digits`.
    fn attempt_to_extract_idd(&mut self) -> bool {
        if let Some(idd) = self.current_metadata.international_prefix.clone() {
            if let Some(m) = idd.find(&self.accrued_digits) {
                if m.start() == 0 {
                    self.is_complete_number = true;
                    let end = m.end();
                    self.national_number = self.accrued_digits[end..].into();
                    self.prefix_before_national_number = self.accrued_digits[..end].into();

                    if !self.accrued_digits.starts_with(consts::PLUS_SIGN) {
                        self.prefix_before_national_number.push(SEPARATOR_BEFORE_NATIONAL_NUMBER);
                    }

                    return true;
                }
            }
        }

        if self.accrued_digits.starts_with(consts::PLUS_SIGN) {
            self.is_complete_number = true;
            self.national_number = self.accrued_digits[1..].into();
            self.prefix_before_national_number = consts::PLUS_SIGN.to_string();
            return true;
        }

        false
    }

    /// Try to peel a country calling code off the front of `national_number`
    /// and swap `current_metadata` for the matching region.
    fn attempt_to_extract_country_code(&mut self) -> bool {
        if self.national_number.is_empty() {
            return false;
        }

        let (code, rest) = extract_country_code(self.database, &self.national_number);

        if code == 0 {
            return false;
        }

        self.national_number = rest;

        if let Some(metas) = self.database.by_code(&code) {
            if let Some(meta) = metas.into_iter().next() {
                self.current_metadata = meta.clone();
            }
        }

        self.prefix_before_national_number.push_str(&code.to_string());
        self.prefix_before_national_number.push(SEPARATOR_BEFORE_NATIONAL_NUMBER);

        // The previously extracted NDD (if any) is no longer valid now that
        // an IDD has been found.
        self.extracted_national_prefix.clear();

        true
    }

    fn attempt_to_choose_pattern_with_prefix_extracted(&mut self) -> String {
        self.able_to_format = true;
        self.is_expecting_country_code = false;
        self.possible_formats.clear();
        self.last_match_position = 0;
        self.formatting_template.clear();
        self.current_formatting_pattern.clear();

        self.attempt_to_choose_formatting_pattern()
    }

    /// Attempts to set the formatting template and returns the formatted
    /// rendering of everything entered so far.
    fn attempt_to_choose_formatting_pattern(&mut self) -> String {
        // Only start attempting to format once at least
        // MIN_LEADING_DIGITS_LENGTH digits of national number have arrived.
        if self.national_number.len() >= MIN_LEADING_DIGITS_LENGTH {
            self.get_available_formats();

            if let Some(formatted) = self.attempt_to_format_accrued_digits() {
                return formatted;
            }

            if self.maybe_create_new_template() {
                return self.input_accrued_national_number();
            }

            return self.accrued_input.clone();
        }

        self.append_national_number(&self.national_number.clone())
    }

    /// Populate `possible_formats` with every usable format of
    /// `current_metadata`, applying the exclusion rules that keep a national
    /// prefix out of formats that do not expect one, then narrow by leading
    /// digits.
    fn get_available_formats(&mut self) {
        let is_international_number = self.is_complete_number && self.extracted_national_prefix.is_empty();

        let formats: &[Format] =
            if is_international_number && !self.current_metadata.international_formats.is_empty() {
                &self.current_metadata.international_formats
            } else {
                &self.current_metadata.formats
            };

        let national_prefix_extracted = !self.extracted_national_prefix.is_empty();

        self.possible_formats = formats
            .iter()
            .filter(|format| {
                if national_prefix_extracted {
                    // A format whose national-prefix rule only covers the
                    // first group, requires a non-optional national prefix,
                    // and has no carrier-code rule cannot represent a number
                    // that had a national prefix extracted.
                    !(is_first_group_only_prefix(format.national_prefix.as_deref())
                        && !format.national_prefix_optional
                        && format.domestic_carrier.is_none())
                } else if !self.is_complete_number {
                    // This number was entered without a national prefix, and
                    // this formatting rule requires one, so discard it.
                    !(!is_first_group_only_prefix(format.national_prefix.as_deref()) && !format.national_prefix_optional)
                } else {
                    true
                }
            })
            .filter(|format| ELIGIBLE_FORMAT_PATTERN.is_match(format.format()))
            .cloned()
            .collect();

        self.narrow_down_possible_formats();
    }

    /// Retain only formats whose `leading_digits` regex (the most specific
    /// one available for the current national-number length) matches as a
    /// prefix of `national_number`. Formats with no `leading_digits` are
    /// always retained.
    fn narrow_down_possible_formats(&mut self) {
        let length = self.national_number.len();

        if length < MIN_LEADING_DIGITS_LENGTH {
            return;
        }

        let national_number = self.national_number.clone();

        self.possible_formats.retain(|format| {
            if format.leading_digits.is_empty() {
                return true;
            }

            let index = (length - MIN_LEADING_DIGITS_LENGTH).min(format.leading_digits.len() - 1);
            let pattern = &format.leading_digits[index];

            pattern.find(&national_number).map(|m| m.start() == 0).unwrap_or(false)
        });
    }

    /// Walk `possible_formats` in order, building a template from the first
    /// one that can accommodate `national_number`. Returns whether a *new*
    /// template was created; if the currently active template's pattern is
    /// still in the candidate list, or nothing in the list can produce a
    /// template, no new template is built (the latter also latches
    /// `able_to_format = false`, mirroring the formats that failed being
    /// pruned from `possible_formats`).
    fn maybe_create_new_template(&mut self) -> bool {
        let mut dead = Vec::new();

        for index in 0..self.possible_formats.len() {
            let format = self.possible_formats[index].clone();

            if format.pattern().as_str() == self.current_formatting_pattern {
                self.prune_dead_formats(&dead);
                return false;
            }

            if let Some(template) = self.create_formatting_template(&format) {
                self.current_formatting_pattern = format.pattern().as_str().into();
                self.should_add_space_after_national_prefix =
                    NATIONAL_PREFIX_SEPARATORS_PATTERN.is_match(format.national_prefix.as_deref().unwrap_or(""));
                self.formatting_template = template;
                // With a new template, any match position tracked against
                // the old one is meaningless.
                self.last_match_position = 0;
                self.prune_dead_formats(&dead);
                return true;
            } else {
                dead.push(index);
            }
        }

        self.prune_dead_formats(&dead);
        self.able_to_format = false;
        false
    }

    fn prune_dead_formats(&mut self, dead: &[usize]) {
        for &index in dead.iter().rev() {
            self.possible_formats.remove(index);
        }
    }

    /// Build a placeholder template out of `format`, by matching its
    /// pattern against an all-nines stand-in and replacing the matched
    /// substring via the format string, then digits with the placeholder
    /// glyph. Returns `None` if the format cannot accommodate as many
    /// digits as have already accrued.
    fn create_formatting_template(&self, format: &Format) -> Option<Vec<char>> {
        let m = format.pattern().find(ALL_NINES)?;
        let stand_in = &ALL_NINES[m.start()..m.end()];

        if stand_in.len() < self.national_number.len() {
            return None;
        }

        let numerical = format.pattern().replace(stand_in, format.format());

        Some(numerical.chars().map(|ch| if ch == '9' { DIGIT_PLACEHOLDER } else { ch }).collect())
    }

    /// Checks whether any candidate format's full pattern matches
    /// `national_number` exactly; if so, applies it as a full replacement
    /// instead of going through the placeholder template. Guarded against
    /// rules that would silently drop a digit (the "Mexico" case in
    /// libphonenumber parlance): the rendered output, stripped to diallable
    /// characters, must still contain every digit (and leading `+`) typed so
    /// far.
    fn attempt_to_format_accrued_digits(&mut self) -> Option<String> {
        for format in self.possible_formats.clone() {
            let full_match = format
                .pattern()
                .find(&self.national_number)
                .map(|m| m.start() == 0 && m.end() == self.national_number.len())
                .unwrap_or(false);

            if !full_match {
                continue;
            }

            self.should_add_space_after_national_prefix =
                NATIONAL_PREFIX_SEPARATORS_PATTERN.is_match(format.national_prefix.as_deref().unwrap_or(""));

            let formatted = format.pattern().replace(&self.national_number, format.format());
            let full_output = self.append_national_number(&formatted);
            let diallable = diallable_chars_only(&full_output);

            if diallable.contains(&self.accrued_digits) {
                return Some(full_output);
            }
        }

        None
    }

    /// Combines the national number with any prefix (IDD/`+`, country code,
    /// national prefix) that was collected, inserting a separator space
    /// where the active template indicates this to be suitable.
    fn append_national_number(&self, national_number: &str) -> String {
        let prefix = &self.prefix_before_national_number;

        if self.should_add_space_after_national_prefix
            && !prefix.is_empty()
            && !prefix.ends_with(SEPARATOR_BEFORE_NATIONAL_NUMBER)
        {
            format!("{prefix}{SEPARATOR_BEFORE_NATIONAL_NUMBER}{national_number}")
        } else {
            format!("{prefix}{national_number}")
        }
    }

    /// Feeds every digit of `national_number` through
    /// [`input_digit_helper`](Self::input_digit_helper) in turn (a newly
    /// built template cannot reuse the old `last_match_position`), and
    /// returns the formatted rendering, or raw `accrued_input` if the
    /// template ran out of room.
    fn input_accrued_national_number(&mut self) -> String {
        if self.national_number.is_empty() {
            return self.prefix_before_national_number.clone();
        }

        let digits: Vec<char> = self.national_number.chars().collect();
        let mut tentative = String::new();

        for digit in digits {
            tentative = self.input_digit_helper(digit);
        }

        if self.able_to_format {
            self.append_national_number(&tentative)
        } else {
            self.accrued_input.clone()
        }
    }

    /// Fill the next available placeholder in `formatting_template` with
    /// `next_char`, returning the filled prefix of the template up to and
    /// including that position. If no placeholder remains: if exactly one
    /// candidate format was left, formatting is abandoned for good
    /// (`able_to_format = false`); otherwise the current template is simply
    /// dropped so the caller can reconsider.
    fn input_digit_helper(&mut self, next_char: char) -> String {
        match self.next_placeholder(self.last_match_position) {
            Some(pos) => {
                self.formatting_template[pos] = next_char;
                self.last_match_position = pos;

                self.formatting_template[..=pos].iter().collect()
            }

            None => {
                if self.possible_formats.len() == 1 {
                    self.able_to_format = false;
                }
                self.current_formatting_pattern.clear();
                self.accrued_input.clone()
            }
        }
    }

    fn next_placeholder(&self, from: usize) -> Option<usize> {
        self.formatting_template[from..].iter().position(|&c| c == DIGIT_PLACEHOLDER).map(|offset| from + offset)
    }

    /// National-prefix stripping applied to the accrued (possibly incomplete) national
    /// number. Handles the NANPA special case where the leading trunk `1`
    /// is always the national prefix, since NANPA national significant
    /// numbers always start with `[2-9]` after it.
    fn remove_national_prefix_from_national_number(&mut self) -> String {
        if self.is_nanpa_number_with_national_prefix() {
            self.prefix_before_national_number.push('1');
            self.prefix_before_national_number.push(SEPARATOR_BEFORE_NATIONAL_NUMBER);
            self.is_complete_number = true;

            let prefix = self.national_number[..1].to_string();
            self.national_number = self.national_number[1..].into();
            return prefix;
        }

        if let Some(parsing) = self.current_metadata.national_prefix_for_parsing.clone() {
            if let Some(m) = parsing.find(&self.national_number) {
                if m.start() == 0 && m.end() > 0 {
                    // When the national prefix is detected, international
                    // formatting rules are used instead of national ones,
                    // since national rules could contain local formats for
                    // numbers entered without an area code.
                    self.is_complete_number = true;
                    let end = m.end();
                    self.prefix_before_national_number.push_str(&self.national_number[..end]);

                    let prefix = self.national_number[..end].to_string();
                    self.national_number = self.national_number[end..].into();
                    return prefix;
                }
            }
        }

        String::new()
    }

    /// Returns true if the current country is a NANPA country (calling code
    /// 1) and the national number begins with the `1[2-9]` trunk prefix.
    /// Numbers beginning with `1[01]` can only be short/emergency numbers,
    /// which do not take a national prefix.
    fn is_nanpa_number_with_national_prefix(&self) -> bool {
        let digits = self.national_number.as_bytes();

        self.current_metadata.country_code == 1 && digits.len() > 2 && digits[0] == b'1' && digits[1] != b'0' && digits[1] != b'1'
    }

    /// Some national prefixes are a substring of others; if extracting the
    /// shorter NDD does not result in a number that can be formatted, see
    /// whether a longer one can be extracted once more digits have arrived.
    fn able_to_extract_longer_ndd(&mut self) -> bool {
        if !self.extracted_national_prefix.is_empty() {
            // Put the extracted NDD back onto the national number before
            // re-extracting.
            let mut reinserted = self.extracted_national_prefix.clone();
            reinserted.push_str(&self.national_number);
            self.national_number = reinserted;

            // Drop the previously extracted NDD from
            // prefix_before_national_number. We cannot simply clear it,
            // since people sometimes (incorrectly) enter a national prefix
            // after the country code, e.g. "+44 (0)20-1234-5678".
            if let Some(index) = self.prefix_before_national_number.rfind(self.extracted_national_prefix.as_str()) {
                self.prefix_before_national_number.truncate(index);
            }
        }

        let previous = std::mem::take(&mut self.extracted_national_prefix);
        let newly_extracted = self.remove_national_prefix_from_national_number();
        let is_longer = newly_extracted != previous;
        self.extracted_national_prefix = newly_extracted;

        is_longer
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::DATABASE;

    fn type_all(formatter: &mut AsYouTypeFormatter, input: &str) -> Vec<String> {
        input.chars().map(|c| formatter.input_digit(c).to_owned()).collect()
    }

    #[test]
    fn us_area_code_number() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        let out = type_all(&mut f, "6502532222");

        assert_eq!(
            out,
            vec![
                "6", "65", "650", "650 2", "650 25", "650 253", "650 2532", "650 253 22", "650 253 222",
                "650 253 2222",
            ]
        );
    }

    #[test]
    fn us_nanpa_leading_trunk_prefix() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        let out = type_all(&mut f, "16502532222");

        assert_eq!(
            out,
            vec![
                "1", "16", "1 65", "1 650", "1 650 2", "1 650 25", "1 650 253", "1 650 253 2", "1 650 253 22",
                "1 650 253 222", "1 650 253 2222",
            ]
        );
    }

    #[test]
    fn unknown_region_leading_plus() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "ZZ");
        let out = type_all(&mut f, "+488812312");

        assert_eq!(
            out,
            vec![
                "+",
                "+4",
                "+48 ",
                "+48 8",
                "+48 88",
                "+48 88 1",
                "+48 88 12",
                "+48 88 123",
                "+48 88 123 1",
                "+48 88 123 12",
            ]
        );
    }

    #[test]
    fn full_width_digits_normalize_to_ascii() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");

        assert_eq!(f.input_digit('\u{FF16}'), "6");
        assert_eq!(f.input_digit('\u{FF15}'), "65");
        assert_eq!(f.input_digit('\u{FF10}'), "650");

        let rest = type_all(&mut f, "2532222");
        assert_eq!(rest.last().unwrap(), "650 253 2222");
    }

    #[test]
    fn abandons_on_punctuation() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");

        assert_eq!(f.input_digit('6'), "6");
        assert_eq!(f.input_digit('5'), "65");
        assert_eq!(f.input_digit('0'), "650");
        assert_eq!(f.input_digit('-'), "650-");
        assert_eq!(f.input_digit('2'), "650-2");

        // Every later character is echoed verbatim.
        assert_eq!(f.input_digit('5'), "650-25");
        assert_eq!(f.input_digit('3'), "650-253");
    }

    #[test]
    fn digits_typed_are_never_lost_from_the_output() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        let mut typed = String::new();

        for c in "16502532222".chars() {
            typed.push(c);
            let out = f.input_digit(c).to_owned();
            let expected_digits: String = typed.chars().filter(|c| c.is_ascii_digit()).collect();
            let actual_digits: String = diallable_chars_only(&out).chars().filter(|c| c.is_ascii_digit()).collect();

            assert_eq!(actual_digits, expected_digits);
        }
    }

    #[test]
    fn clear_resets_formatter_to_fresh_state() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        f.input_digit('6');
        f.input_digit('5');
        f.clear();

        assert_eq!(f.input_digit('6'), "6");
        assert_eq!(f.input_digit('5'), "65");
    }

    #[test]
    fn remembered_position_stays_in_bounds() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        let out = f.input_digit_and_remember_position('6').to_owned();
        assert!(f.remembered_position() <= out.chars().count());

        for c in "50253222".chars() {
            let out = f.input_digit(c).to_owned();
            assert!(f.remembered_position() <= out.chars().count());
        }
    }

    #[test]
    fn remembered_position_abandoned_formatting_uses_raw_offset() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        f.input_digit('6');
        f.input_digit('5');
        f.input_digit('0');
        let out = f.input_digit_and_remember_position('-').to_owned();

        assert_eq!(f.remembered_position(), 4);
        assert_eq!(out, "650-");
    }

    #[test]
    fn extracted_national_prefix_reports_ndd() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        type_all(&mut f, "16502532222");

        assert_eq!(f.extracted_national_prefix(), "1");
    }

    #[test]
    fn disqualifying_character_latches_raw_echo_forever() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        type_all(&mut f, "650");
        assert_eq!(f.input_digit('*'), "650*");
        assert_eq!(f.input_digit('2'), "650*2");
        assert_eq!(f.input_digit('5'), "650*25");
    }

    #[test]
    fn alphabetic_characters_are_disqualifying_not_dial_pad_digits() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "US");
        let out = type_all(&mut f, "12AB");

        assert_eq!(out, vec!["1", "12", "12A", "12AB"]);
    }

    #[test]
    fn belarus_promotes_to_a_longer_national_prefix() {
        let mut f = AsYouTypeFormatter::new(&DATABASE, "BY");
        let out = type_all(&mut f, "9999912345");

        assert_eq!(
            out,
            vec![
                "9", "99", "999", "9999", "99999 ", "99999 1", "99999 12", "99999 123", "99999 1234",
                "99999 12 345",
            ]
        );
    }

    #[test]
    fn too_long_number_with_multiple_leading_digit_patterns_falls_back_to_raw() {
        // Once more digits have arrived than any surviving template can hold, and
        // only one candidate format is left, formatting is permanently abandoned.
        let mut f = AsYouTypeFormatter::new(&DATABASE, "BY");
        let out = type_all(&mut f, "88190123");

        assert_eq!(
            out,
            vec!["8", "88", "881", "8 819", "8 8190", "881 901", "8 819 012", "88190123"]
        );
    }
}
