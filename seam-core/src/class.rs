//! Character classes over Unicode code points.
//!
//! A class is the predicate attached to a consuming automaton edge.
//! Classes are interned into a pool at compile time and referenced by
//! index, so matching state never carries class data around.
//!
//! Named Unicode properties resolve through a static perfect-hash
//! registry (`phf`). Identifier properties come from `unicode-xid`;
//! the emoji table is a compact range list.

use unicode_xid::UnicodeXID;

/// A named Unicode property with a membership function.
#[derive(Debug, Clone, Copy)]
pub struct PropertyClass {
    /// Canonical property name, e.g. `"Letter"`.
    pub name: &'static str,
    matches: fn(char) -> bool,
}

impl PropertyClass {
    /// Check membership of a code point.
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        (self.matches)(c)
    }
}

impl PartialEq for PropertyClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for PropertyClass {}

fn is_letter(c: char) -> bool {
    c.is_alphabetic()
}

fn is_white_space(c: char) -> bool {
    c.is_whitespace()
}

fn is_decimal_number(c: char) -> bool {
    c.is_numeric()
}

fn is_xid_start(c: char) -> bool {
    UnicodeXID::is_xid_start(c)
}

fn is_xid_continue(c: char) -> bool {
    UnicodeXID::is_xid_continue(c)
}

/// Code point ranges with default emoji presentation.
///
/// Covers the major emoji blocks (Miscellaneous Symbols subsets,
/// Transport, Emoticons, Supplemental Symbols, Symbols Extended-A).
const EMOJI_PRESENTATION_RANGES: &[(u32, u32)] = &[
    (0x231A, 0x231B),
    (0x23E9, 0x23EC),
    (0x23F0, 0x23F0),
    (0x23F3, 0x23F3),
    (0x25FD, 0x25FE),
    (0x2614, 0x2615),
    (0x2648, 0x2653),
    (0x267F, 0x267F),
    (0x2693, 0x2693),
    (0x26A1, 0x26A1),
    (0x26AA, 0x26AB),
    (0x26BD, 0x26BE),
    (0x26C4, 0x26C5),
    (0x26CE, 0x26CE),
    (0x26D4, 0x26D4),
    (0x26EA, 0x26EA),
    (0x26F2, 0x26F3),
    (0x26F5, 0x26F5),
    (0x26FA, 0x26FA),
    (0x26FD, 0x26FD),
    (0x2705, 0x2705),
    (0x270A, 0x270B),
    (0x2728, 0x2728),
    (0x274C, 0x274C),
    (0x274E, 0x274E),
    (0x2753, 0x2755),
    (0x2757, 0x2757),
    (0x2795, 0x2797),
    (0x27B0, 0x27B0),
    (0x27BF, 0x27BF),
    (0x2B1B, 0x2B1C),
    (0x2B50, 0x2B50),
    (0x2B55, 0x2B55),
    (0x1F004, 0x1F004),
    (0x1F0CF, 0x1F0CF),
    (0x1F18E, 0x1F18E),
    (0x1F191, 0x1F19A),
    (0x1F201, 0x1F201),
    (0x1F21A, 0x1F21A),
    (0x1F22F, 0x1F22F),
    (0x1F232, 0x1F236),
    (0x1F238, 0x1F23A),
    (0x1F250, 0x1F251),
    (0x1F300, 0x1F320),
    (0x1F32D, 0x1F335),
    (0x1F337, 0x1F37C),
    (0x1F37E, 0x1F393),
    (0x1F3A0, 0x1F3CA),
    (0x1F3CF, 0x1F3D3),
    (0x1F3E0, 0x1F3F0),
    (0x1F3F4, 0x1F3F4),
    (0x1F3F8, 0x1F43E),
    (0x1F440, 0x1F440),
    (0x1F442, 0x1F4FC),
    (0x1F4FF, 0x1F53D),
    (0x1F54B, 0x1F54E),
    (0x1F550, 0x1F567),
    (0x1F57A, 0x1F57A),
    (0x1F595, 0x1F596),
    (0x1F5A4, 0x1F5A4),
    (0x1F5FB, 0x1F64F),
    (0x1F680, 0x1F6C5),
    (0x1F6CC, 0x1F6CC),
    (0x1F6D0, 0x1F6D2),
    (0x1F6EB, 0x1F6EC),
    (0x1F6F4, 0x1F6FC),
    (0x1F7E0, 0x1F7EB),
    (0x1F90C, 0x1F93A),
    (0x1F93C, 0x1F945),
    (0x1F947, 0x1F978),
    (0x1F97A, 0x1F9CB),
    (0x1F9CD, 0x1F9FF),
    (0x1FA70, 0x1FA74),
    (0x1FA78, 0x1FA7A),
    (0x1FA80, 0x1FA86),
    (0x1FA90, 0x1FAA8),
    (0x1FAB0, 0x1FAB6),
    (0x1FAC0, 0x1FAC2),
    (0x1FAD0, 0x1FAD6),
];

fn is_emoji_presentation(c: char) -> bool {
    let cp = c as u32;
    EMOJI_PRESENTATION_RANGES
        .binary_search_by(|&(lo, hi)| {
            if cp < lo {
                std::cmp::Ordering::Greater
            } else if cp > hi {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Registry of supported property names.
static PROPERTIES: phf::Map<&'static str, PropertyClass> = phf::phf_map! {
    "Letter" => PropertyClass { name: "Letter", matches: is_letter },
    "White_Space" => PropertyClass { name: "White_Space", matches: is_white_space },
    "Decimal_Number" => PropertyClass { name: "Decimal_Number", matches: is_decimal_number },
    "XID_Start" => PropertyClass { name: "XID_Start", matches: is_xid_start },
    "XID_Continue" => PropertyClass { name: "XID_Continue", matches: is_xid_continue },
    "Emoji_Presentation" => PropertyClass { name: "Emoji_Presentation", matches: is_emoji_presentation },
};

/// Look up a property by name.
pub fn property(name: &str) -> Option<&'static PropertyClass> {
    PROPERTIES.get(name)
}

/// Word characters for `\w` and word-boundary assertions (ASCII set,
/// matching the default regex dialect semantics).
#[inline]
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A character class: the predicate on one consuming edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharClass {
    /// Any code point (including line terminators).
    Any,
    /// A union of inclusive ranges, optionally negated.
    Ranges {
        ranges: Vec<(char, char)>,
        negated: bool,
    },
    /// Word characters (`\w` / `\W`).
    Word { negated: bool },
    /// A named Unicode property (`\p{..}` / `\P{..}`).
    Property {
        class: &'static PropertyClass,
        negated: bool,
    },
}

impl CharClass {
    /// A class matching exactly one code point.
    pub fn single(c: char) -> Self {
        CharClass::Ranges {
            ranges: vec![(c, c)],
            negated: false,
        }
    }

    /// A class matching one inclusive range.
    pub fn range(lo: char, hi: char) -> Self {
        CharClass::Ranges {
            ranges: vec![(lo, hi)],
            negated: false,
        }
    }

    /// A class from a list of inclusive ranges.
    pub fn ranges(ranges: &[(char, char)]) -> Self {
        CharClass::Ranges {
            ranges: ranges.to_vec(),
            negated: false,
        }
    }

    /// The negation of a list of inclusive ranges.
    pub fn negated(ranges: &[(char, char)]) -> Self {
        CharClass::Ranges {
            ranges: ranges.to_vec(),
            negated: true,
        }
    }

    /// A named property class, if the name is registered.
    pub fn property(name: &str) -> Option<Self> {
        property(name).map(|class| CharClass::Property {
            class,
            negated: false,
        })
    }

    /// Check membership of a code point.
    pub fn contains(&self, c: char) -> bool {
        match self {
            CharClass::Any => true,
            CharClass::Ranges { ranges, negated } => {
                ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != *negated
            }
            CharClass::Word { negated } => is_word_char(c) != *negated,
            CharClass::Property { class, negated } => class.contains(c) != *negated,
        }
    }

    /// If the class matches exactly one ASCII byte, return it.
    ///
    /// Used for the literal prefilter: a pattern whose every match must
    /// begin with this byte can skip dead scan regions with `memchr`.
    pub(crate) fn single_ascii(&self) -> Option<u8> {
        match self {
            CharClass::Ranges { ranges, negated: false } => match ranges.as_slice() {
                [(lo, hi)] if lo == hi && lo.is_ascii() => Some(*lo as u8),
                _ => None,
            },
            _ => None,
        }
    }
}
