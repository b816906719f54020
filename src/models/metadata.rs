//! SEO metadata document stored once per page identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Recommended upper bound for `title`; longer titles get truncated in search results.
pub const TITLE_HINT_LEN: usize = 60;

/// Recommended upper bound for `description`.
pub const DESCRIPTION_HINT_LEN: usize = 160;

/// Metadata for a single page.
///
/// The struct holds the fields the service understands. Anything else found in
/// the stored JSON lands in `extra` and is written back verbatim.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    /// Primary key, also the blob name without the `.json` suffix.
    #[serde(default)]
    pub page_identifier: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noindex: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nofollow: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<String>,

    /// Provenance, stamped by the writer and never interpreted by readers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    /// Unrecognised fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Which required field a document is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Title,
    Description,
}

impl std::fmt::Display for MissingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingField::Title => f.write_str("title"),
            MissingField::Description => f.write_str("description"),
        }
    }
}

impl MetadataDocument {
    /// Check that `title` and `description` are present and non-blank.
    pub fn check_required(&self) -> Result<(), MissingField> {
        if self.title.trim().is_empty() {
            return Err(MissingField::Title);
        }
        if self.description.trim().is_empty() {
            return Err(MissingField::Description);
        }
        Ok(())
    }

    /// Advisory length hints. These never block a save.
    pub fn length_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let title_len = self.title.chars().count();
        if title_len > TITLE_HINT_LEN {
            warnings.push(format!(
                "title is {} characters; {} or fewer is recommended",
                title_len, TITLE_HINT_LEN
            ));
        }
        let description_len = self.description.chars().count();
        if description_len > DESCRIPTION_HINT_LEN {
            warnings.push(format!(
                "description is {} characters; {} or fewer is recommended",
                description_len, DESCRIPTION_HINT_LEN
            ));
        }
        warnings
    }

    /// Effective tags for rendering, with social fields falling back to the core ones.
    pub fn page_meta(&self, default_image: &str) -> PageMeta {
        let image = self
            .og_image
            .clone()
            .unwrap_or_else(|| default_image.to_string());

        PageMeta {
            title: self.title.clone(),
            description: self.description.clone(),
            keywords: self.keywords.join(", "),
            canonical_url: self.canonical_url.clone(),
            robots: robots_directive(self.noindex, self.nofollow),
            og_title: self.og_title.clone().unwrap_or_else(|| self.title.clone()),
            og_description: self
                .og_description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            og_image: image.clone(),
            og_type: self.og_type.clone().unwrap_or_else(|| "website".into()),
            twitter_card: self
                .twitter_card
                .clone()
                .unwrap_or_else(|| "summary_large_image".into()),
            twitter_title: self
                .twitter_title
                .clone()
                .or_else(|| self.og_title.clone())
                .unwrap_or_else(|| self.title.clone()),
            twitter_description: self
                .twitter_description
                .clone()
                .or_else(|| self.og_description.clone())
                .unwrap_or_else(|| self.description.clone()),
            twitter_image: self.twitter_image.clone().unwrap_or(image),
        }
    }
}

fn robots_directive(noindex: Option<bool>, nofollow: Option<bool>) -> String {
    let index = if noindex.unwrap_or(false) {
        "noindex"
    } else {
        "index"
    };
    let follow = if nofollow.unwrap_or(false) {
        "nofollow"
    } else {
        "follow"
    };
    format!("{}, {}", index, follow)
}

/// Render-ready view of a [`MetadataDocument`]. Computed per request, never stored.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub canonical_url: Option<String>,
    pub robots: String,
    pub og_title: String,
    pub og_description: String,
    pub og_image: String,
    pub og_type: String,
    pub twitter_card: String,
    pub twitter_title: String,
    pub twitter_description: String,
    pub twitter_image: String,
}

impl PageMeta {
    /// Render the tags that go inside a page `<head>`.
    pub fn to_head_html(&self) -> String {
        let mut html = String::new();
        html.push_str(&format!("<title>{}</title>\n", html_escape(&self.title)));
        push_meta(&mut html, "name", "description", &self.description);
        if !self.keywords.is_empty() {
            push_meta(&mut html, "name", "keywords", &self.keywords);
        }
        push_meta(&mut html, "name", "robots", &self.robots);
        if let Some(url) = &self.canonical_url {
            html.push_str(&format!(
                "<link rel=\"canonical\" href=\"{}\">\n",
                html_escape(url)
            ));
        }
        push_meta(&mut html, "property", "og:title", &self.og_title);
        push_meta(&mut html, "property", "og:description", &self.og_description);
        push_meta(&mut html, "property", "og:image", &self.og_image);
        push_meta(&mut html, "property", "og:type", &self.og_type);
        if let Some(url) = &self.canonical_url {
            push_meta(&mut html, "property", "og:url", url);
        }
        push_meta(&mut html, "name", "twitter:card", &self.twitter_card);
        push_meta(&mut html, "name", "twitter:title", &self.twitter_title);
        push_meta(
            &mut html,
            "name",
            "twitter:description",
            &self.twitter_description,
        );
        push_meta(&mut html, "name", "twitter:image", &self.twitter_image);
        html
    }
}

fn push_meta(html: &mut String, attr: &str, key: &str, content: &str) {
    html.push_str(&format!(
        "<meta {}=\"{}\" content=\"{}\">\n",
        attr,
        key,
        html_escape(content)
    ));
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_round_trip() {
        let raw = json!({
            "pageIdentifier": "about",
            "title": "About Us",
            "description": "Who we are",
            "keywords": ["study abroad", "consultancy"],
            "heroBanner": {"src": "/img/about.jpg", "alt": "Team"},
            "schemaType": "AboutPage"
        });

        let doc: MetadataDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.extra.len(), 2);
        assert_eq!(doc.extra["schemaType"], json!("AboutPage"));

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let doc: MetadataDocument = serde_json::from_value(json!({"title": "Only title"})).unwrap();
        assert_eq!(doc.check_required(), Err(MissingField::Description));

        let doc: MetadataDocument =
            serde_json::from_value(json!({"title": "  ", "description": "x"})).unwrap();
        assert_eq!(doc.check_required(), Err(MissingField::Title));
    }

    #[test]
    fn social_fields_fall_back_to_core_fields() {
        let doc = MetadataDocument {
            title: "Contact".into(),
            description: "Talk to a counsellor".into(),
            og_title: Some("Contact our team".into()),
            ..Default::default()
        };

        let meta = doc.page_meta("/og-default.jpg");
        assert_eq!(meta.og_title, "Contact our team");
        assert_eq!(meta.og_description, "Talk to a counsellor");
        assert_eq!(meta.twitter_title, "Contact our team");
        assert_eq!(meta.twitter_image, "/og-default.jpg");
        assert_eq!(meta.robots, "index, follow");
    }

    #[test]
    fn robots_reflects_crawler_directives() {
        let doc = MetadataDocument {
            title: "Draft".into(),
            description: "Hidden".into(),
            noindex: Some(true),
            nofollow: Some(true),
            ..Default::default()
        };
        assert_eq!(doc.page_meta("").robots, "noindex, nofollow");
    }

    #[test]
    fn head_html_is_escaped() {
        let doc = MetadataDocument {
            title: "Fees & <Costs>".into(),
            description: "\"Quoted\"".into(),
            canonical_url: Some("https://example.com/cost".into()),
            ..Default::default()
        };
        let html = doc.page_meta("/og.jpg").to_head_html();
        assert!(html.contains("<title>Fees &amp; &lt;Costs&gt;</title>"));
        assert!(html.contains("content=\"&quot;Quoted&quot;\""));
        assert!(html.contains("<link rel=\"canonical\" href=\"https://example.com/cost\">"));
    }

    #[test]
    fn length_warnings_are_advisory() {
        let doc = MetadataDocument {
            title: "t".repeat(61),
            description: "d".repeat(160),
            ..Default::default()
        };
        let warnings = doc.length_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("title is 61"));
        assert!(doc.check_required().is_ok());
    }
}
