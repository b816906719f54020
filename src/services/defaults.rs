//! Synthesized metadata for pages with nothing stored.
//!
//! Everything here is a pure function of the page identifier and the
//! template tables below. Results are never written back to storage.

use crate::models::metadata::MetadataDocument;

/// Image used for social previews when a document does not name one.
pub const DEFAULT_OG_IMAGE: &str = "/images/og-default.jpg";

const DESTINATION_PREFIX: &str = "study-in-";

const SITE_TITLE: &str = "Study Abroad Consultants | Universities, Courses & Visa Guidance";
const SITE_DESCRIPTION: &str = "Plan your overseas education with expert counselling on \
universities, courses, admissions, scholarships and student visas.";
const SITE_KEYWORDS: &[&str] = &[
    "study abroad",
    "overseas education",
    "study abroad consultants",
    "university admissions",
    "student visa",
];

/// Country names that read better upper-cased.
const ACRONYMS: &[&str] = &["usa", "uk", "uae"];

/// Title/description/keyword templates. `{country}` is the display name,
/// `{country_lc}` its lower-case form.
struct Template {
    title: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
}

const DESTINATION_TEMPLATE: Template = Template {
    title: "Study in {country} | Universities, Admissions & Visas",
    description: "Explore universities, courses, costs and student visa requirements to \
study in {country}. Get expert guidance at every step of your application.",
    keywords: &[
        "study in {country_lc}",
        "{country_lc} universities",
        "{country_lc} student visa",
        "study abroad {country_lc}",
    ],
};

const SUBPAGE_TEMPLATES: &[(&str, Template)] = &[
    (
        "programs",
        Template {
            title: "Programs & Courses in {country} | Study in {country}",
            description: "Compare undergraduate, postgraduate and diploma programs in \
{country} and find the course that fits your goals.",
            keywords: &[
                "courses in {country_lc}",
                "{country_lc} degree programs",
                "study programs {country_lc}",
            ],
        },
    ),
    (
        "culture",
        Template {
            title: "Student Life & Culture in {country}",
            description: "What everyday life is like for international students in \
{country}: culture, accommodation, food and community.",
            keywords: &[
                "student life in {country_lc}",
                "{country_lc} culture",
                "living in {country_lc}",
            ],
        },
    ),
    (
        "careers",
        Template {
            title: "Careers & Jobs After Studying in {country}",
            description: "Part-time work rules, post-study work rights and career \
prospects for graduates in {country}.",
            keywords: &[
                "careers in {country_lc}",
                "jobs in {country_lc} after study",
                "{country_lc} post-study work visa",
            ],
        },
    ),
    (
        "cost",
        Template {
            title: "Cost of Studying in {country} | Tuition & Living Expenses",
            description: "A breakdown of tuition fees, living costs and budgeting tips \
for students planning to study in {country}.",
            keywords: &[
                "cost of studying in {country_lc}",
                "{country_lc} tuition fees",
                "living cost {country_lc}",
            ],
        },
    ),
    (
        "scholarships",
        Template {
            title: "Scholarships to Study in {country}",
            description: "Government, university and private scholarships available to \
international students in {country}, with eligibility and deadlines.",
            keywords: &[
                "scholarships in {country_lc}",
                "{country_lc} scholarships for international students",
                "study in {country_lc} with scholarship",
            ],
        },
    ),
];

/// Site-wide default document.
pub fn site_default(id: &str) -> MetadataDocument {
    MetadataDocument {
        page_identifier: id.to_string(),
        title: SITE_TITLE.to_string(),
        description: SITE_DESCRIPTION.to_string(),
        keywords: SITE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        og_image: Some(DEFAULT_OG_IMAGE.to_string()),
        ..Default::default()
    }
}

/// Build a usable document for `id` from naming conventions alone.
pub fn resolve_default(id: &str) -> MetadataDocument {
    let mut document = site_default(id);

    let Some((country_slug, subpage)) = parse_destination(id) else {
        return document;
    };

    let country = humanize(country_slug);
    let template = subpage
        .and_then(|subpage| {
            SUBPAGE_TEMPLATES
                .iter()
                .find(|(name, _)| *name == subpage)
                .map(|(_, template)| template)
        })
        .unwrap_or(&DESTINATION_TEMPLATE);

    document.title = interpolate(template.title, &country);
    document.description = interpolate(template.description, &country);
    document.keywords = template
        .keywords
        .iter()
        .map(|k| interpolate(k, &country))
        .collect();
    document
}

/// Split `study-in-<country>[/<subpage>]` into its parts.
fn parse_destination(id: &str) -> Option<(&str, Option<&str>)> {
    let rest = id.strip_prefix(DESTINATION_PREFIX)?;
    let (country, subpage) = match rest.split_once('/') {
        Some((country, subpage)) => (country, Some(subpage)),
        None => (rest, None),
    };
    if country.is_empty() || country.split('-').any(str::is_empty) {
        return None;
    }
    Some((country, subpage.filter(|s| !s.is_empty())))
}

/// `new-zealand` -> `New Zealand`, `usa` -> `USA`.
pub fn humanize(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_ascii_lowercase();
            if ACRONYMS.contains(&lower.as_str()) {
                return lower.to_ascii_uppercase();
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn interpolate(template: &str, country: &str) -> String {
    template
        .replace("{country_lc}", &country.to_lowercase())
        .replace("{country}", country)
}
