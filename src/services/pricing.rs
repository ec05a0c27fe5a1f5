use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::domain::Product;

pub const BILL_AMOUNT_MIN: i64 = 10_000;
pub const BILL_AMOUNT_MAX: i64 = 999_999;

/// Simulated bill lookup. BILL products carry no real price in the catalog,
/// so the amount is derived from the customer id: stable for a given
/// customer within one pricer, different across pricers.
#[derive(Debug, Clone, Copy)]
pub struct BillPricer {
    salt: u64,
}

impl Default for BillPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl BillPricer {
    pub fn new() -> Self {
        Self {
            salt: rand::random(),
        }
    }

    pub fn with_salt(salt: u64) -> Self {
        Self { salt }
    }

    pub fn bill_amount(&self, customer_id: &str) -> i64 {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.to_be_bytes());
        hasher.update(customer_id.as_bytes());
        let digest = hasher.finalize();

        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_be_bytes(seed));
        rng.gen_range(BILL_AMOUNT_MIN..=BILL_AMOUNT_MAX)
    }

    /// Price charged for `product`, before fees.
    pub fn price_for(&self, product: &Product, customer_id: &str) -> i64 {
        if product.is_bill() {
            self.bill_amount(customer_id)
        } else {
            product.price
        }
    }
}
