//! Message text and platform metadata for generated messages.

use std::collections::BTreeMap;

use {
    courier_common::Platform,
    courier_store::models::{Automation, BusinessProfile, Client, Promotion},
    serde_json::{Value, json},
};

/// Named values substituted into `{placeholder}`s.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Client and business fields. `fallback_name` stands in for a missing
    /// business name.
    #[must_use]
    pub fn for_client(client: &Client, profile: &BusinessProfile, fallback_name: &str) -> Self {
        let mut vars = Self::new();
        vars.insert("client_name", client.name.trim());
        vars.insert("first_name", client.first_name());
        let business_name = if profile.business_name.trim().is_empty() {
            fallback_name
        } else {
            profile.business_name.trim()
        };
        vars.insert("business_name", business_name);
        for (key, value) in [
            ("business_address", &profile.address),
            ("business_phone", &profile.phone),
            ("business_email", &profile.email),
            ("business_website", &profile.website),
            ("business_instagram", &profile.instagram),
        ] {
            vars.insert(key, value.as_deref().unwrap_or_default());
        }
        vars
    }

    #[must_use]
    pub fn with_promotion(mut self, promotion: &Promotion) -> Self {
        self.insert("promotion_title", promotion.title.as_str());
        for (key, value) in [
            ("promotion_description", &promotion.description),
            ("promotion_discount", &promotion.discount),
            ("promotion_valid_until", &promotion.valid_until),
        ] {
            self.insert(key, value.as_deref().unwrap_or_default());
        }
        self
    }
}

/// Replace `{name}` placeholders. Unknown placeholders are left as written.
#[must_use]
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(['}', '{']) {
            Some(end) if after.as_bytes()[end] == b'}' => {
                let key = after[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + end + 2]),
                }
                rest = &after[end + 1..];
            },
            _ => {
                out.push('{');
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

/// Template parameters in positional order.
///
/// `var_1`, `var_2`, ... map to named fields; ordering is by the numeric
/// suffix so `var_10` comes after `var_9`.
#[must_use]
pub fn ordered_template_params(
    variables: &BTreeMap<String, String>,
    vars: &TemplateVars,
) -> Vec<String> {
    let mut positional: Vec<(u32, &str)> = variables
        .iter()
        .filter_map(|(slot, field)| {
            slot.strip_prefix("var_")
                .and_then(|n| n.parse::<u32>().ok())
                .map(|n| (n, field.as_str()))
        })
        .collect();
    positional.sort_by_key(|(n, _)| *n);
    positional
        .into_iter()
        .map(|(_, field)| vars.get(field).unwrap_or_default().to_string())
        .collect()
}

/// Platform metadata stored on the scheduled message.
#[must_use]
pub fn message_metadata(automation: &Automation, platform: Platform, vars: &TemplateVars) -> Value {
    let mut meta = json!({ "automation_kind": automation.kind.as_str() });
    match platform {
        Platform::Whatsapp => {
            if let Some(template) = automation
                .config
                .whatsapp_template
                .as_ref()
                .filter(|t| !t.name.trim().is_empty())
            {
                let params = ordered_template_params(&template.variables, vars);
                let mut spec = json!({
                    "name": template.name,
                    "language": template.language,
                });
                if !params.is_empty() {
                    let parameters: Vec<Value> = params
                        .iter()
                        .map(|p| json!({"type": "text", "text": p}))
                        .collect();
                    spec["components"] = json!([{"type": "body", "parameters": parameters}]);
                }
                meta["template"] = spec;
            }
        },
        Platform::Email => {
            if let Some(subject) = automation.config.subject.as_deref() {
                meta["subject"] = Value::String(render(subject, vars));
            }
        },
        Platform::Instagram => {},
    }
    meta
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_store::models::{AutomationConfig, AutomationKind, WhatsAppTemplateConfig},
        rstest::rstest,
    };

    fn vars() -> TemplateVars {
        let client = Client {
            id: "c1".into(),
            owner_id: "o1".into(),
            name: "Ana María Gómez".into(),
            phone: Some("5492611234567".into()),
            instagram_id: None,
            email: Some("ana@example.com".into()),
            birthday: None,
            created_at: 0,
        };
        let profile = BusinessProfile {
            owner_id: "o1".into(),
            business_name: "Panadería Sol".into(),
            address: Some("San Martín 123".into()),
            ..BusinessProfile::default()
        };
        TemplateVars::for_client(&client, &profile, "Bot").with_promotion(&Promotion {
            id: "p1".into(),
            owner_id: "o1".into(),
            title: "2x1 en medialunas".into(),
            description: None,
            discount: Some("50%".into()),
            valid_until: Some("2026-03-31".into()),
            created_at: 0,
        })
    }

    #[rstest]
    #[case("Hola {first_name}!", "Hola Ana!")]
    #[case("{client_name}, te saluda {business_name}", "Ana María Gómez, te saluda Panadería Sol")]
    #[case("{ promotion_title } -{promotion_discount}", "2x1 en medialunas -50%")]
    #[case("Hasta {promotion_valid_until} en {business_address}", "Hasta 2026-03-31 en San Martín 123")]
    #[case("Sin datos: {unknown}", "Sin datos: {unknown}")]
    #[case("llaves {sueltas", "llaves {sueltas")]
    #[case("{{first_name}}", "{Ana}")]
    #[case("", "")]
    fn renders(#[case] template: &str, #[case] expected: &str) {
        assert_eq!(render(template, &vars()), expected);
    }

    #[test]
    fn missing_business_name_falls_back() {
        let client = Client {
            id: "c1".into(),
            owner_id: "o1".into(),
            name: "Beto".into(),
            phone: None,
            instagram_id: None,
            email: None,
            birthday: None,
            created_at: 0,
        };
        let vars = TemplateVars::for_client(&client, &BusinessProfile::default(), "Mi Bot");
        assert_eq!(vars.get("business_name"), Some("Mi Bot"));
        assert_eq!(vars.get("business_phone"), Some(""));
    }

    #[test]
    fn template_params_follow_numeric_suffix() {
        let variables = BTreeMap::from([
            ("var_10".to_string(), "promotion_discount".to_string()),
            ("var_2".to_string(), "business_name".to_string()),
            ("var_1".to_string(), "first_name".to_string()),
            ("header".to_string(), "client_name".to_string()),
            ("var_3".to_string(), "nope".to_string()),
        ]);
        assert_eq!(
            ordered_template_params(&variables, &vars()),
            vec!["Ana", "Panadería Sol", "", "50%"]
        );
    }

    #[test]
    fn metadata_per_platform() {
        let automation = Automation {
            kind: AutomationKind::Promotion,
            config: AutomationConfig {
                subject: Some("{promotion_title} en {business_name}".into()),
                whatsapp_template: Some(WhatsAppTemplateConfig {
                    name: "promo_v2".into(),
                    language: "es_AR".into(),
                    variables: BTreeMap::from([
                        ("var_1".into(), "first_name".into()),
                        ("var_2".into(), "promotion_title".into()),
                    ]),
                }),
                ..AutomationConfig::default()
            },
            ..Automation::default()
        };

        let wa = message_metadata(&automation, Platform::Whatsapp, &vars());
        assert_eq!(wa["template"]["name"], "promo_v2");
        assert_eq!(wa["template"]["language"], "es_AR");
        assert_eq!(
            wa["template"]["components"][0]["parameters"][1]["text"],
            "2x1 en medialunas"
        );

        let email = message_metadata(&automation, Platform::Email, &vars());
        assert_eq!(email["subject"], "2x1 en medialunas en Panadería Sol");
        assert!(email.get("template").is_none());

        let ig = message_metadata(&automation, Platform::Instagram, &vars());
        assert_eq!(ig, json!({"automation_kind": "promotion"}));
    }
}
