//! Validator set membership, quorum threshold, and proposer selection

use l2_chain::Address;

/// Ordered validator committee
///
/// Membership and order are treated as a stable snapshot for the duration of
/// one epoch's protocol run; set changes are an external concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Address>,
}

impl ValidatorSet {
    /// Create a validator set from an ordered address list
    ///
    /// The order is significant: it is the basis for proposer selection.
    pub fn new(validators: Vec<Address>) -> Self {
        Self { validators }
    }

    /// Check committee membership
    pub fn is_validator(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }

    /// The committee in proposer-selection order
    pub fn validators(&self) -> &[Address] {
        &self.validators
    }

    /// Committee size
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Minimum distinct signers required for quorum: ceil(2N/3)
    pub fn threshold(&self) -> usize {
        (2 * self.validators.len()).div_ceil(3)
    }

    /// Round-robin proposer for an epoch: `validators[epoch % N]`
    ///
    /// Deliberately does not handle proposer failure or round change, so an
    /// offline proposer stalls checkpoint submission for its epoch until the
    /// committee votes to rotate.
    pub fn proposer(&self, epoch: u64) -> Address {
        if self.validators.is_empty() {
            return Address::ZERO;
        }

        self.validators[(epoch % self.validators.len() as u64) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(n: usize) -> Vec<Address> {
        (0..n).map(|i| Address::new([i as u8 + 1; 20])).collect()
    }

    #[test]
    fn test_threshold_is_two_thirds_rounded_up() {
        for (n, expected) in [(1, 1), (2, 2), (3, 2), (4, 3), (5, 4), (6, 4), (7, 5)] {
            let set = ValidatorSet::new(addresses(n));
            assert_eq!(set.threshold(), expected, "N = {n}");
        }
    }

    #[test]
    fn test_membership() {
        let set = ValidatorSet::new(addresses(3));
        assert!(set.is_validator(&Address::new([2u8; 20])));
        assert!(!set.is_validator(&Address::new([99u8; 20])));
    }

    #[test]
    fn test_proposer_round_robin() {
        let validators = addresses(4);
        let set = ValidatorSet::new(validators.clone());

        for epoch in 0..12u64 {
            assert_eq!(set.proposer(epoch), validators[(epoch % 4) as usize]);
        }

        // Pure function of (order, epoch): a second set built from the same
        // list selects the same proposer
        let replica = ValidatorSet::new(validators);
        assert_eq!(set.proposer(7), replica.proposer(7));
    }

    #[test]
    fn test_proposer_empty_set() {
        let set = ValidatorSet::new(Vec::new());
        assert_eq!(set.proposer(5), Address::ZERO);
        assert_eq!(set.threshold(), 0);
    }
}
