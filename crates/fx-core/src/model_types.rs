use serde::{Deserialize, Serialize};

/// One entry of the model catalog served next to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub visibility: Visibility,
    pub latest_version: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl ModelDescriptor {
    fn public(name: &str, description: &str, owner: &str, latest_version: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            owner: owner.to_string(),
            visibility: Visibility::Public,
            latest_version: latest_version.to_string(),
        }
    }

    /// `owner/name`, the form the upstream model endpoints use
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Fine-tuned FLUX variants offered to the user, in display order.
pub fn catalog() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::public(
            "flux-dev-realism",
            "FLUX.1-dev with XLabs-AI’s realism lora",
            "xlabs-ai",
            "39b3434f194f87a900d1bc2b6d4b983e90f0dde1d5022c27b52c143d670758fa",
        ),
        ModelDescriptor::public(
            "flux-half-illustration",
            "Flux lora, use 'in the style of TOK' to trigger generation, creates half photo half illustrated elements",
            "davisbrown",
            "687458266007b196a490e79a77bae4b123c1792900e1cb730a51344887ad9832",
        ),
        ModelDescriptor::public(
            "flux-childbook-illustration",
            "Flux Lora, use 'in the style of TOK' in your prompt as trigger",
            "samsa-ai",
            "cc3beea6ddc39416cf121390b476b1a8802ca47db03fb97306ef6c25f38f60a2",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order() {
        let names: Vec<_> = catalog().into_iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            ["flux-dev-realism", "flux-half-illustration", "flux-childbook-illustration"]
        );
    }

    #[test]
    fn test_all_public() {
        assert!(catalog().iter().all(|m| m.visibility == Visibility::Public));
    }

    #[test]
    fn test_slug() {
        assert_eq!(catalog()[1].slug(), "davisbrown/flux-half-illustration");
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(&catalog()[0]).unwrap();
        assert_eq!(value["visibility"], "public");
        assert_eq!(value["owner"], "xlabs-ai");
        assert_eq!(value["latest_version"].as_str().unwrap().len(), 64);
    }
}
