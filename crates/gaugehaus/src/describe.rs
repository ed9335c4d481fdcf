//! Plain-text summary of an attribution vector.

use crate::explain::AttributionVector;

/// One line per feature, in attribution order, stating the input value and
/// the signed effect on the predicted price.
///
/// A zero contribution reads as "decreased by 0.00": only strictly positive
/// contributions count as increases.
pub fn compose_description(attribution: &AttributionVector) -> String {
    let mut out = String::from("Factors influencing the predicted price:\n");
    for item in attribution {
        out.push_str(&format!(
            "- {}: Value = {}, {} price by {:.2} units.\n",
            item.name,
            item.value,
            direction_word(item.contribution),
            item.contribution.abs()
        ));
    }
    out
}

fn direction_word(contribution: f64) -> &'static str {
    if contribution > 0.0 {
        "increased"
    } else {
        "decreased"
    }
}
