//! Movement-code (CFOP) tables that drive renaming and the IPI rules.

use serde::{Deserialize, Serialize};

/// The four CFOP families a batch cares about. Overridable from `nfk.toml`
/// under `[movement]`; the defaults cover the usual marketplace flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementTables {
    /// Sales to customers.
    pub sales: Vec<String>,
    /// Customer devolutions / undelivered returns (entries).
    pub devolutions: Vec<String>,
    /// Returns from temporary deposit.
    pub returns: Vec<String>,
    /// Shipments to deposit / symbolic remittances.
    pub shipments: Vec<String>,
}

fn codes(list: &[&str]) -> Vec<String> {
    list.iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for MovementTables {
    fn default() -> Self {
        Self {
            sales: codes(&[
                "5101", "5102", "5103", "5104", "5105", "5106", "5401", "5403", "5405", "6101",
                "6102", "6103", "6104", "6105", "6106", "6107", "6108", "6401", "6403", "6404",
            ]),
            devolutions: codes(&["1201", "1202", "1410", "1411", "2201", "2202", "2410", "2411"]),
            returns: codes(&["1906", "1907", "1949", "2906", "2907", "2949"]),
            shipments: codes(&[
                "5905", "5906", "5907", "5923", "5949", "6905", "6906", "6907", "6923", "6949",
            ]),
        }
    }
}

impl MovementTables {
    pub fn is_sale(&self, code: &str) -> bool {
        contains(&self.sales, code)
    }

    pub fn is_devolution(&self, code: &str) -> bool {
        contains(&self.devolutions, code)
    }

    pub fn is_return(&self, code: &str) -> bool {
        contains(&self.returns, code)
    }

    pub fn is_shipment(&self, code: &str) -> bool {
        contains(&self.shipments, code)
    }

    /// Return or shipment code; both are eligible for IPI zeroing.
    pub fn is_return_or_shipment(&self, code: &str) -> bool {
        self.is_return(code) || self.is_shipment(code)
    }
}

fn contains(list: &[String], code: &str) -> bool {
    let code = code.trim();
    list.iter()
        .any(|c| c == code)
}
