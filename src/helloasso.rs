//! HelloAsso notification payload model and classifier.
//!
//! HelloAsso pushes one notification per payment to the registered webhook
//! URL. Most deliveries are for other forms or other items and must be
//! ignored without error; only a fully processed purchase of one of the
//! padel-racket rental tiers is actionable.
//!
//! Field names mirror HelloAsso's camelCase JSON; unknown fields are
//! tolerated so that payload evolutions on their side don't break parsing.

use serde::Deserialize;

/// Form slug of the racket-rental form; anything else is ignored.
pub const RENTAL_FORM_SLUG: &str = "location-de-raquettes-de-padel";

/// Catalog tier ids for the three rental variants.
const TIER_ONE_RACKET: i64 = 16987683;
const TIER_TWO_RACKETS: i64 = 18135283;
const TIER_THREE_OR_FOUR_RACKETS: i64 = 18135558;

/// Only items in this state have actually been paid.
const STATE_PROCESSED: &str = "Processed";

/// Add-on option id for "Je récupère les raquettes à l'accueil".
const OPTION_FRONT_DESK: i64 = 18137239;

/// Required custom-field names on a rental item.
pub const FIELD_DAY: &str = "Jour de la location";
pub const FIELD_TIME: &str = "Début de la location";

#[derive(Debug, Default, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default)]
    pub form_slug: String,
    #[serde(default)]
    pub payer: Option<Payer>,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tier_id: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub options: Vec<ItemOption>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOption {
    #[serde(default)]
    pub option_id: Option<i64>,
}

impl Item {
    /// Look up a custom-field answer by its exact name.
    pub fn custom_field(&self, name: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.answer.as_str())
    }
}

/// Which rental tier was purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacketVariant {
    One,
    Two,
    ThreeOrFour,
}

impl RacketVariant {
    fn from_tier(tier_id: i64) -> Option<Self> {
        match tier_id {
            TIER_ONE_RACKET => Some(RacketVariant::One),
            TIER_TWO_RACKETS => Some(RacketVariant::Two),
            TIER_THREE_OR_FOUR_RACKETS => Some(RacketVariant::ThreeOrFour),
            _ => None,
        }
    }

    /// Racket count as reported in emails. The 3-or-4 tier reports 3.
    pub fn count(self) -> u32 {
        match self {
            RacketVariant::One => 1,
            RacketVariant::Two => 2,
            RacketVariant::ThreeOrFour => 3,
        }
    }
}

/// A billable rental item found in a notification.
#[derive(Debug)]
pub struct Rental<'a> {
    pub item: &'a Item,
    pub variant: RacketVariant,
    /// True when the payer selected pickup at the front desk.
    pub front_desk_pickup: bool,
}

/// Decide whether this notification is a billable rental purchase.
///
/// Rules, in order: the form slug must match; the first item with a known
/// rental tier *and* state `Processed` wins; the front-desk flag comes from
/// the matched item's option set. Absence of a match is a normal outcome.
pub fn classify(data: &NotificationData) -> Option<Rental<'_>> {
    if data.form_slug != RENTAL_FORM_SLUG {
        return None;
    }

    let (item, variant) = data.items.iter().find_map(|item| {
        let variant = item.tier_id.and_then(RacketVariant::from_tier)?;
        if item.state.as_deref() != Some(STATE_PROCESSED) {
            return None;
        }
        Some((item, variant))
    })?;

    let front_desk_pickup = item
        .options
        .iter()
        .any(|opt| opt.option_id == Some(OPTION_FRONT_DESK));

    Some(Rental {
        item,
        variant,
        front_desk_pickup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rental_item(tier_id: i64, state: &str) -> Item {
        Item {
            name: Some("Location d'une raquette de padel".into()),
            tier_id: Some(tier_id),
            state: Some(state.into()),
            ..Item::default()
        }
    }

    fn data(form_slug: &str, items: Vec<Item>) -> NotificationData {
        NotificationData {
            form_slug: form_slug.into(),
            payer: None,
            items,
        }
    }

    #[test]
    fn wrong_form_slug_never_matches() {
        let d = data("autre-formulaire", vec![rental_item(16987683, "Processed")]);
        assert!(classify(&d).is_none());
    }

    #[test]
    fn unprocessed_item_never_matches() {
        for state in ["Pending", "Refunded", "Canceled", ""] {
            let d = data(RENTAL_FORM_SLUG, vec![rental_item(16987683, state)]);
            assert!(classify(&d).is_none(), "state {state:?} matched");
        }
    }

    #[test]
    fn unknown_tier_never_matches() {
        let d = data(RENTAL_FORM_SLUG, vec![rental_item(123456, "Processed")]);
        assert!(classify(&d).is_none());
    }

    #[test]
    fn first_processed_rental_item_wins() {
        let d = data(
            RENTAL_FORM_SLUG,
            vec![
                rental_item(16987683, "Pending"),
                rental_item(18135283, "Processed"),
                rental_item(18135558, "Processed"),
            ],
        );
        let rental = classify(&d).expect("should match");
        assert_eq!(rental.variant, RacketVariant::Two);
        assert!(!rental.front_desk_pickup);
    }

    #[test]
    fn front_desk_option_is_detected() {
        let mut item = rental_item(18135558, "Processed");
        item.options = vec![
            ItemOption { option_id: Some(999) },
            ItemOption {
                option_id: Some(18137239),
            },
        ];
        let d = data(RENTAL_FORM_SLUG, vec![item]);
        let rental = classify(&d).expect("should match");
        assert!(rental.front_desk_pickup);
        assert_eq!(rental.variant.count(), 3);
    }

    #[test]
    fn custom_field_lookup_is_by_exact_name() {
        let mut item = rental_item(16987683, "Processed");
        item.custom_fields = vec![
            CustomField {
                name: FIELD_DAY.into(),
                answer: "01/07/2025".into(),
            },
            CustomField {
                name: FIELD_TIME.into(),
                answer: "18:30".into(),
            },
        ];
        assert_eq!(item.custom_field(FIELD_DAY), Some("01/07/2025"));
        assert_eq!(item.custom_field(FIELD_TIME), Some("18:30"));
        assert_eq!(item.custom_field("Jour"), None);
    }

    #[test]
    fn empty_payload_parses_and_ignores() {
        let n: Notification = serde_json::from_str("{}").unwrap();
        assert!(n.data.is_none());
    }
}
