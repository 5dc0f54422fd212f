//! Finalized analysis results as served by the results endpoint.
//!
//! Every field defaults when absent: results are produced by an LLM pipeline
//! and partially filled agreements are common.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
    pub role: String,
    pub name: String,
    pub incorporation_country: String,
    pub incorporation_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Risk {
    pub risk_type: String,
    pub description: String,
    pub level: String,
    pub impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_clause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Obligation {
    pub description: String,
    pub due_date: String,
    pub recurring: bool,
    pub recurrence_pattern: String,
    pub status: String,
    pub reminder_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoverningLaw {
    pub country: String,
    pub state: String,
    pub most_favored_country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndustryPatterns {
    pub industry: String,
    pub unusual_clauses: Vec<String>,
    pub common_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractDocument {
    pub document_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Agreement {
    pub agreement_name: String,
    pub agreement_type: String,
    pub effective_date: String,
    pub expiration_date: String,
    pub renewal_term: String,
    #[serde(rename = "Notice_period_to_Terminate_Renewal")]
    pub notice_period_to_terminate_renewal: String,
    pub parties: Vec<Party>,
    pub governing_law: GoverningLaw,
    pub risks: Vec<Risk>,
    pub obligations: Vec<Obligation>,
    pub industry_patterns: IndustryPatterns,
    pub email_subject: String,
    pub envelope_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<ContractDocument>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub agreement: Agreement,
}

impl Contract {
    /// Risks rated `high`, in document order.
    pub fn high_risks(&self) -> impl Iterator<Item = &Risk> {
        self.agreement
            .risks
            .iter()
            .filter(|risk| risk.level.eq_ignore_ascii_case("high"))
    }
}
