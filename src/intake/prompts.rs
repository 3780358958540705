//! Prompt text for the intake collaborators, and tolerant parsing of the
//! extraction reply.

use tracing::warn;

use super::collaborators::{ExtractionContext, ResponseContext};
use super::model::{CustomerRecord, Field};
use super::normalize::RawCandidates;
use super::state::IntakePhase;

/// How many trailing turns of history the extractor sees.
const EXTRACTION_HISTORY_TURNS: usize = 6;

/// Guidance for asking about one field.
pub fn field_hint(field: Field) -> &'static str {
    match field {
        Field::Zip => "Ask for a 5-digit zip code.",
        Field::MinBudget | Field::MaxBudget => "Ask for a specific dollar amount.",
        Field::CreditRating => {
            "Offer the options `Excellent`, `Very Good`, `Good`, `Fair` and `Poor`."
        }
        Field::CarCondition => "The only options are `new` and `pre-owned`.",
        Field::TransactionType => {
            "The only options are `buy` and `lease`. Pre-owned cars can only be bought."
        }
        Field::CarType => "Offer `suv`, `sedan`, `truck`, `van` or `coupe`.",
        Field::Year => "Ask for a model year.",
        Field::HasTradeIn => "Ask whether they have a vehicle to trade in (yes or no).",
        Field::MaxMonthlyPayment | Field::MaxDownPayment | Field::LeaseDownPayment => {
            "Ask for a specific dollar amount."
        }
        Field::MaxMileage | Field::AnnualMileage => "Ask for a number of miles.",
        _ => "",
    }
}

fn phase_focus(phase: IntakePhase) -> &'static str {
    match phase {
        IntakePhase::PersonalInfo => "the customer's name, email, phone number and zip code",
        IntakePhase::Budget => "the customer's budget range and credit rating",
        IntakePhase::CarSelection => "whether they want a new or pre-owned car, and buy or lease",
        IntakePhase::CarDetails => {
            "the body type, make, model, year, mileage limit and desired features"
        }
        IntakePhase::TradeIn => "whether they have a trade-in vehicle",
        IntakePhase::TransactionDetails => "payment or lease terms",
    }
}

/// Build the extraction prompt for one customer message.
pub fn extraction_prompt(ctx: &ExtractionContext<'_>) -> String {
    let known = serde_json::to_string_pretty(ctx.record).unwrap_or_else(|_| "{}".to_string());
    let turns = ctx.history.turns();
    let recent = &turns[turns.len().saturating_sub(EXTRACTION_HISTORY_TURNS)..];
    let recent = recent
        .iter()
        .map(|t| format!("{:?}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n");
    let field_names = Field::ALL
        .iter()
        .map(Field::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You pull structured customer details out of a car-sales conversation.\n\n\
         CURRENT PHASE: {phase} (focus: {focus})\n\n\
         Already known (null means unknown, \"N/A\" means not applicable):\n{known}\n\n\
         Recent conversation:\n{recent}\n\n\
         Latest customer message:\n{message}\n\n\
         Return a flat JSON object using only these keys: {field_names}.\n\
         Rules:\n\
         - Include only values the customer actually stated. Leave everything else out.\n\
         - Amounts are plain numbers (\"30k\" is 30000).\n\
         - zip is exactly 5 digits. year is a 4-digit year.\n\
         - credit_rating is one of Excellent, Very Good, Good, Fair, Poor, or the customer's own words if unsure.\n\
         - car_condition is \"new\" or \"pre-owned\". transaction_type is \"buy\" or \"lease\".\n\
         - car_type is one of suv, sedan, truck, van, coupe.\n\
         - has_trade_in is true or false. If the answer is unclear, copy the customer's words.\n\
         - A bare reply such as \"yes\" or \"no\" answers the question the assistant just asked.\n\n\
         Respond with ONLY valid JSON, no explanation or markdown formatting.",
        phase = ctx.phase,
        focus = phase_focus(ctx.phase),
        message = ctx.message,
    )
}

/// Build the system prompt for the next assistant reply.
pub fn response_system_prompt(ctx: &ResponseContext<'_>) -> String {
    let mut prompt = String::from(
        "You are a professional car sales assistant helping a customer find the right car.\n\
         Collect the information the dealership needs, one question at a time.\n\
         Guidelines:\n\
         - Keep replies short and polite. Use the customer's name only when it reads naturally.\n\
         - Acknowledge what the customer just told you before asking the next question.\n\
         - Answer questions about the dealership from the knowledge section when one is given.\n\
         - Use light markdown: **bold** for options, bullet points for lists.\n\
         - End with one clear question.",
    );

    prompt.push_str(&format!("\n\nCURRENT PHASE: {}", ctx.phase));

    if !ctx.clarify.is_empty() {
        let fields = ctx
            .clarify
            .iter()
            .map(|f| format!("{f} ({})", field_hint(*f)))
            .collect::<Vec<_>>()
            .join("; ");
        prompt.push_str(&format!(
            "\n\nThe customer's last answer for these fields was unclear. \
             Ask them to clarify before anything else: {fields}"
        ));
    }

    if let Some(field) = ctx.next_field {
        prompt.push_str(&format!("\nNEXT FIELD TO ASK: {field}"));
        let hint = field_hint(field);
        if !hint.is_empty() {
            prompt.push_str(&format!("\n{hint}"));
        }
    }

    if !ctx.collected.is_empty() {
        let collected = serde_json::to_string_pretty(ctx.collected)
            .unwrap_or_else(|_| "{}".to_string());
        prompt.push_str(&format!("\n\nWhat you've learned so far:\n{collected}"));
    }

    if let Some(knowledge) = ctx.knowledge.filter(|k| !k.trim().is_empty()) {
        prompt.push_str(&format!("\n\nDealership knowledge:\n{}", knowledge.trim()));
    }

    prompt
}

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a professional car sales assistant. \
Write a concise, actionable summary of a customer interaction for the sales team.";

/// Build the summary request from the final record and conversation highlights.
pub fn summary_prompt(record: &CustomerRecord, highlights: &[&str]) -> String {
    let details = serde_json::to_string_pretty(&record.filled_fields())
        .unwrap_or_else(|_| "{}".to_string());
    let highlights = if highlights.is_empty() {
        "(none)".to_string()
    } else {
        highlights
            .iter()
            .map(|h| format!("- Customer mentioned: {h}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Customer details:\n{details}\n\n\
         Conversation highlights:\n{highlights}\n\n\
         Structure the summary as:\n\
         1. Customer profile (name, contact, location).\n\
         2. Car preferences (condition, type, make, model, year, features).\n\
         3. Budget and financing (range, credit rating, buy or lease terms).\n\
         4. Trade-in.\n\
         5. Suggested next steps for the sales team.\n\
         Use only the details above. Do not speculate."
    )
}

/// Pull a JSON object out of an LLM reply.
///
/// Handles bare JSON, fenced code blocks and objects surrounded by prose.
/// Returns `None` when no object can be parsed.
pub fn parse_candidates(text: &str) -> Option<RawCandidates> {
    let body = extract_json_object(text);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(kind = ?other, "Extraction reply was JSON but not an object");
            None
        }
        Err(e) => {
            warn!(error = %e, "Could not parse extraction reply as JSON");
            None
        }
    }
}

fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}
