use std::fmt;

use serde::{Deserialize, Serialize};

use super::super::domain::LeadStatus;

/// Controller operations that read or move a lead through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GenerateLead,
    QualifyLead,
    SendOutboundContact,
    ProcessEoi,
    TransferLead,
    CloseLead,
    AmendLead,
}

impl Operation {
    pub const fn label(self) -> &'static str {
        match self {
            Operation::GenerateLead => "generate_lead",
            Operation::QualifyLead => "qualify_lead",
            Operation::SendOutboundContact => "send_outbound_contact",
            Operation::ProcessEoi => "process_eoi",
            Operation::TransferLead => "transfer_lead",
            Operation::CloseLead => "close_lead",
            Operation::AmendLead => "amend_lead",
        }
    }

    /// Whether the operation may start from `status`.
    pub const fn permits(self, status: LeadStatus) -> bool {
        use LeadStatus::*;

        match self {
            Operation::GenerateLead => false,
            Operation::QualifyLead => matches!(
                status,
                New | Qualified | Disqualified | Contacted | EoiReceived
            ),
            Operation::SendOutboundContact => matches!(status, Qualified),
            Operation::ProcessEoi => matches!(status, Contacted),
            Operation::TransferLead => matches!(status, EoiReceived),
            Operation::CloseLead => !status.is_terminal(),
            Operation::AmendLead => matches!(status, New | Disqualified),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
