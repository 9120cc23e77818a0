//! Stateless proposal checks that need no chain access.

use async_trait::async_trait;
use shared_types::{Address, ClientDealProposal};

use crate::domain::errors::ValidationError;
use crate::ports::outbound::ProposalValidator;

/// Checks a proposal is signed, addressed to this provider and has a
/// sensible duration.
#[derive(Debug, Clone)]
pub struct BasicProposalValidator {
    provider: Address,
}

impl BasicProposalValidator {
    pub fn new(provider: Address) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ProposalValidator for BasicProposalValidator {
    async fn validate(&self, proposal: &ClientDealProposal) -> Result<(), ValidationError> {
        let terms = &proposal.proposal;

        if proposal.client_signature.is_empty() {
            return Err(ValidationError::MissingSignature);
        }
        if terms.provider != self.provider {
            return Err(ValidationError::WrongProvider {
                expected: self.provider.to_string(),
                got: terms.provider.to_string(),
            });
        }
        if terms.piece_cid.is_empty() {
            return Err(ValidationError::MissingPieceCid);
        }
        if terms.start_epoch >= terms.end_epoch {
            return Err(ValidationError::InvalidDuration {
                start: terms.start_epoch,
                end: terms.end_epoch,
            });
        }
        Ok(())
    }
}
