//! `*INCLUDE_TRANSFORM` card layout and ID/unit-factor application.
//!
//! Five fixed-width cards: file name, seven offset fields, a rotation
//! offset + prefix/suffix, three unit factors + temperature-curve name + an
//! output flag, and a transform id, each field only overwritten when it
//! actually parses as a number — a card left blank keeps the struct's
//! default.

use crate::card::Card;

/// Offsets and unit factors carried by one `*INCLUDE_TRANSFORM` block.
#[derive(Debug, Clone)]
pub struct IncludeTransform {
    pub file_name: String,
    pub idnoff: i64,
    pub ideoff: i64,
    pub idpoff: i64,
    pub idmoff: i64,
    pub idsoff: i64,
    pub idfoff: i64,
    pub iddoff: i64,
    pub idroff: i64,
    pub prefix: String,
    pub suffix: String,
    pub fctmas: f64,
    pub fcttim: f64,
    pub fctlen: f64,
    pub fcttem: String,
    pub incout1: i64,
    pub tranid: i64,
}

impl Default for IncludeTransform {
    fn default() -> Self {
        IncludeTransform {
            file_name: String::new(),
            idnoff: 0,
            ideoff: 0,
            idpoff: 0,
            idmoff: 0,
            idsoff: 0,
            idfoff: 0,
            iddoff: 0,
            idroff: 0,
            prefix: String::new(),
            suffix: String::new(),
            fctmas: 1.0,
            fcttim: 1.0,
            fctlen: 1.0,
            fcttem: String::new(),
            incout1: 0,
            tranid: 0,
        }
    }
}

/// Only overwrite the default when the field actually looks numeric.
fn try_int_field(card: &Card) -> Option<i64> {
    use crate::card::CardValueType;
    match card.get_type() {
        CardValueType::Int => Some(card.parse_int()),
        CardValueType::Float => Some(card.parse_f64() as i64),
        CardValueType::String => None,
    }
}

fn try_float_field(card: &Card) -> Option<f64> {
    use crate::card::CardValueType;
    match card.get_type() {
        CardValueType::Int | CardValueType::Float => Some(card.parse_f64()),
        CardValueType::String => None,
    }
}

impl IncludeTransform {
    /// Parse the five cards of an `*INCLUDE_TRANSFORM` block. Missing cards
    /// (a short block) leave the remaining fields at their defaults.
    pub fn parse_cards(cards: &[String]) -> IncludeTransform {
        let mut transform = IncludeTransform::default();

        if let Some(line) = cards.first() {
            transform.file_name = Card::new(line).parse_whole();
        }

        if let Some(line) = cards.get(1) {
            let mut card = Card::new(line);
            card.begin(10);
            for slot in [
                &mut transform.idnoff,
                &mut transform.ideoff,
                &mut transform.idpoff,
                &mut transform.idmoff,
                &mut transform.idsoff,
                &mut transform.idfoff,
                &mut transform.iddoff,
            ] {
                if let Some(value) = try_int_field(&card) {
                    *slot = value;
                }
                card.next();
            }
        }

        if let Some(line) = cards.get(2) {
            let mut card = Card::new(line);
            card.begin(10);
            if let Some(value) = try_int_field(&card) {
                transform.idroff = value;
            }
            card.next(); // skip one field
            card.next();
            transform.prefix = card.parse_string();
            card.next();
            transform.suffix = card.parse_string();
        }

        if let Some(line) = cards.get(3) {
            let mut card = Card::new(line);
            card.begin(10);
            for slot in [&mut transform.fctmas, &mut transform.fcttim, &mut transform.fctlen] {
                if let Some(value) = try_float_field(&card) {
                    *slot = value;
                }
                card.next();
            }
            transform.fcttem = card.parse_string();
            card.next();
            if let Some(value) = try_int_field(&card) {
                transform.incout1 = value;
            }
        }

        if let Some(line) = cards.get(4) {
            let card = Card::new(line);
            if let Some(value) = try_int_field(&card) {
                transform.tranid = value;
            }
        }

        transform
    }
}

/// A `*DEFINE_TRANSFORMATION` option: a name plus seven raw parameters. Kept
/// permissive (`String` name) rather than a closed enum of `MIRROR`/`TRANSL`/
/// `SCALE`/`ROTATE`, since LS-DYNA documents further option names beyond
/// those four.
#[derive(Debug, Clone)]
pub struct TransformationOption {
    pub name: String,
    pub parameters: [f64; 7],
}

#[derive(Debug, Clone)]
pub struct DefineTransformation {
    pub tranid: i64,
    pub title: Option<String>,
    pub options: Vec<TransformationOption>,
}

impl DefineTransformation {
    /// Parse the body of a `*DEFINE_TRANSFORMATION[_TITLE]` keyword. `cards`
    /// excludes the keyword line itself. If `has_title`, the first card is a
    /// free-form title instead of the tranid card.
    pub fn parse_cards(cards: &[String], has_title: bool) -> Option<DefineTransformation> {
        let mut index = 0;
        let title = if has_title {
            let t = cards.get(index).map(|l| Card::new(l).parse_whole());
            index += 1;
            t
        } else {
            None
        };

        let tranid_line = cards.get(index)?;
        index += 1;
        let mut tranid_card = Card::new(tranid_line);
        tranid_card.begin(10);
        let tranid = tranid_card.parse_int();

        let mut options = Vec::new();
        for line in &cards[index..] {
            let mut card = Card::new(line);
            card.begin(10);
            let name = card.parse_string();
            if name.is_empty() {
                continue;
            }
            card.next();
            let mut parameters = [0f64; 7];
            for param in &mut parameters {
                *param = card.parse_f64();
                card.next();
            }
            options.push(TransformationOption { name, parameters });
        }

        Some(DefineTransformation {
            tranid,
            title,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offsets_and_factors() {
        let cards = vec![
            "sub.k".to_string(),
            "       100       101         0         0         0         0         0".to_string(),
            "         0".to_string(),
            "       2.0".to_string(),
        ];
        let transform = IncludeTransform::parse_cards(&cards);
        assert_eq!(transform.file_name, "sub.k");
        assert_eq!(transform.idnoff, 100);
        assert_eq!(transform.ideoff, 101);
        assert_eq!(transform.fctmas, 2.0);
        // factors not present on the card keep their default
        assert_eq!(transform.fcttim, 1.0);
        assert_eq!(transform.fctlen, 1.0);
    }

    #[test]
    fn missing_cards_keep_defaults() {
        let cards = vec!["sub.k".to_string()];
        let transform = IncludeTransform::parse_cards(&cards);
        assert_eq!(transform.idnoff, 0);
        assert_eq!(transform.fctmas, 1.0);
        assert_eq!(transform.tranid, 0);
    }

    #[test]
    fn define_transformation_reads_options() {
        let cards = vec![
            "         1".to_string(),
            "MIRROR           1         0         0         0         0         0         0"
                .to_string(),
        ];
        let transform = DefineTransformation::parse_cards(&cards, false).unwrap();
        assert_eq!(transform.tranid, 1);
        assert_eq!(transform.options.len(), 1);
        assert_eq!(transform.options[0].name, "MIRROR");
    }
}
