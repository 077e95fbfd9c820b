//! Customers, their terminal models, and the labels an operator checks on each model.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceModel {
    pub name: &'static str,
    pub labels: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEntry {
    pub name: &'static str,
    pub models: &'static [DeviceModel],
}

const PAGSEGURO: &[DeviceModel] = &[
    DeviceModel {
        name: "NLP SP930 PAGSEGURO (YELLOW)",
        labels: &[
            "2/2 PRODUCT LABEL(BRAZIL)",
            "1/2 PRODUCT LABEL(BRAZIL())",
            "LABEL(PN/SN) or LABEL(PN/SN BRAZIL)",
        ],
    },
    DeviceModel {
        name: "NLP SP930 PAGSEGURO (GREEN)",
        labels: &[
            "LABEL(BOX) or LABEL(PN/SN BRAZIL)",
            "LABEL(BOX) or LABEL(PN/SN BRAZIL)",
            "WEIGHT LABEL",
        ],
    },
    DeviceModel {
        name: "NLP SP930 PAGSEGURO (BLUE)",
        labels: &[
            "LABEL(PN/SN) or  Label(PN/SN Brazil)",
            "2/1 LABEL(CARTON BRAZIL) OR LABEL CARTON BRAZIL",
            "1/2 LABEL(PCBA BRAZIL FOR MA)",
        ],
    },
    DeviceModel {
        name: "NLP SP930 PAGSEGURO (RED)",
        labels: &["Label(PCBA)", "2/2 LABEL(PCBA BRAZIL) for IO board"],
    },
];

const NUBANK: &[DeviceModel] = &[DeviceModel {
    name: "Model C",
    labels: &[
        "1/2 LABEL(PCBA BRAZIL FOR MA)",
        "LABEL(MACINEID)",
        "1/2 PRODUCT LABEL(BRAZIL())",
        "LABEL(PN/SN) or LABEL(PN/SN BRAZIL)",
        "LABEL(BOX) or LABEL(PN/SN BRAZIL)",
        "LABEL(BOX) or LABEL(PN/SN BRAZIL)",
        "WEIGHT LABEL",
    ],
}];

const SANTANDER: &[DeviceModel] = &[DeviceModel {
    name: "Model E",
    labels: &[
        "Label(PCBA)",
        "2/2 LABEL(PCBA BRAZIL) for IO board",
        "Label(IMEI)",
        "2/2 PRODUCT LABEL(BRAZIL)",
        "LABEL(PN/SN) or  Label(PN/SN Brazil)",
    ],
}];

const BANCO_DO_BRASIL: &[DeviceModel] = &[DeviceModel {
    name: "Model G",
    labels: &[
        "Label(PCBA)",
        "2/2 LABEL(PCBA BRAZIL) for IO board",
        "Label(IMEI)",
        "2/2 PRODUCT LABEL(BRAZIL)",
    ],
}];

const CATALOG: &[ClientEntry] = &[
    ClientEntry {
        name: "PAGSEGURO",
        models: PAGSEGURO,
    },
    ClientEntry {
        name: "NUBANK",
        models: NUBANK,
    },
    ClientEntry {
        name: "SANTANDER",
        models: SANTANDER,
    },
    ClientEntry {
        name: "BANCO DO BRASIL",
        models: BANCO_DO_BRASIL,
    },
];

pub fn catalog() -> &'static [ClientEntry] {
    CATALOG
}

/// Case-insensitive, whitespace-tolerant lookup by client name.
pub fn find_client(name: &str) -> Option<&'static ClientEntry> {
    let wanted = normalize(name);
    CATALOG.iter().find(|c| normalize(c.name) == wanted)
}

/// Labels to check for `model` of `client`, in checking order.
pub fn expected_labels(client: &str, model: &str) -> Option<&'static [&'static str]> {
    let wanted = normalize(model);
    find_client(client)?
        .models
        .iter()
        .find(|m| normalize(m.name) == wanted)
        .map(|m| m.labels)
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_spacing() {
        assert_eq!(find_client("banco  do brasil").unwrap().name, "BANCO DO BRASIL");
        assert!(find_client("itau").is_none());
    }

    #[test]
    fn labels_for_model() {
        let labels = expected_labels("Santander", "model e").unwrap();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[2], "Label(IMEI)");
        assert!(expected_labels("Santander", "Model Z").is_none());
    }

    #[test]
    fn every_model_lists_labels() {
        assert_eq!(catalog().len(), 4);
        for client in catalog() {
            assert!(!client.models.is_empty(), "{} has no models", client.name);
            for model in client.models {
                assert!(!model.labels.is_empty(), "{} has no labels", model.name);
            }
        }
    }
}
