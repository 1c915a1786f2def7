//! LinkedIn profile URLs and the profile records the scraper returns.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{TrailerError, TrailerResult};

/// Trims the input, adds `https://` when no scheme is given and checks that the
/// result points at a `linkedin.com/in/<handle>` page.
pub fn normalize_profile_url(input: &str) -> TrailerResult<String> {
    let trimmed = input.trim();
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| TrailerError::InvalidUrl)?;
    let host = url.host_str().ok_or(TrailerError::InvalidUrl)?;
    if host != "linkedin.com" && !host.ends_with(".linkedin.com") {
        return Err(TrailerError::NotAProfile);
    }
    if profile_handle(&url).is_none() {
        return Err(TrailerError::NotAProfile);
    }

    Ok(url.to_string())
}

fn profile_handle(url: &Url) -> Option<&str> {
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "in" {
            return segments.next().filter(|handle| !handle.is_empty());
        }
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Birthday {
    pub day: Option<Value>,
    pub month: Option<Value>,
    pub year: Option<Value>,
}

// Scraper output drifts between string, number and bool for the same field.
// These accept any of them and turn anything unusable into `None`.

fn loose_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn loose_count<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

fn loose_bool<'de, D: Deserializer<'de>>(de: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Bool(b) => Some(b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRaw {
    #[serde(default, deserialize_with = "loose_string")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub company_size: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub company_website: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_started_on: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_ended_on: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_location: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    pub job_still_working: Option<bool>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_location_country: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub employment_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceClean {
    pub company_name: Option<String>,
    pub company_size: Option<String>,
    pub company_website: Option<String>,
    pub logo: Option<String>,
    pub title: Option<String>,
    pub job_description: Option<String>,
    pub job_started_on: Option<String>,
    pub job_ended_on: Option<String>,
    pub job_location: Option<String>,
    pub job_still_working: Option<bool>,
    pub job_location_country: Option<String>,
    pub employment_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillRaw {
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
}

/// Profile record as the scraper delivers it. Unknown fields are ignored;
/// educations and languages are kept verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRaw {
    #[serde(default, deserialize_with = "loose_string")]
    pub linkedin_url: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub headline: Option<String>,
    #[serde(default, deserialize_with = "loose_count")]
    pub connections: Option<u64>,
    #[serde(default, deserialize_with = "loose_count")]
    pub followers: Option<u64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_started_on: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_location: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    pub job_still_working: Option<bool>,
    #[serde(default, deserialize_with = "loose_string")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub company_industry: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub company_website: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub company_size: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub current_job_duration: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub address_with_country: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub profile_pic_high_quality: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub background_pic: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub about: Option<String>,
    #[serde(default, deserialize_with = "loose_birthday")]
    pub birthday: Option<Birthday>,
    #[serde(default, deserialize_with = "loose_list")]
    pub experiences: Option<Vec<ExperienceRaw>>,
    #[serde(default, deserialize_with = "loose_list")]
    pub skills: Option<Vec<SkillRaw>>,
    #[serde(default, deserialize_with = "loose_list")]
    pub educations: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "loose_list")]
    pub languages: Option<Vec<Value>>,
}

fn loose_birthday<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Birthday>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(de)?).ok())
}

/// Keeps the entries that parse; a non-list becomes `None`.
fn loose_list<'de, D, T>(de: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

/// The subset of a profile the rest of the pipeline uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileClean {
    pub linkedin_url: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub connections: Option<u64>,
    pub followers: Option<u64>,
    pub job_title: Option<String>,
    pub job_started_on: Option<String>,
    pub job_location: Option<String>,
    pub job_still_working: Option<bool>,
    pub company_name: Option<String>,
    pub company_industry: Option<String>,
    pub company_website: Option<String>,
    pub company_size: Option<String>,
    pub current_job_duration: Option<String>,
    pub address_with_country: Option<String>,
    pub profile_pic_high_quality: Option<String>,
    pub background_pic: Option<String>,
    pub about: Option<String>,
    pub birthday: Option<Birthday>,
    pub experiences: Option<Vec<ExperienceClean>>,
    pub skills: Option<Vec<String>>,
    pub educations: Option<Vec<Value>>,
    pub languages: Option<Vec<Value>>,
}

impl From<ExperienceRaw> for ExperienceClean {
    fn from(exp: ExperienceRaw) -> Self {
        Self {
            company_name: exp.company_name,
            company_size: exp.company_size,
            company_website: exp.company_website,
            logo: exp.logo,
            title: exp.title,
            job_description: exp.job_description,
            job_started_on: exp.job_started_on,
            job_ended_on: exp.job_ended_on,
            job_location: exp.job_location,
            job_still_working: exp.job_still_working,
            job_location_country: exp.job_location_country,
            employment_type: exp.employment_type,
        }
    }
}

impl From<ProfileRaw> for ProfileClean {
    fn from(raw: ProfileRaw) -> Self {
        Self {
            linkedin_url: raw.linkedin_url,
            first_name: raw.first_name,
            last_name: raw.last_name,
            full_name: raw.full_name,
            headline: raw.headline,
            connections: raw.connections,
            followers: raw.followers,
            job_title: raw.job_title,
            job_started_on: raw.job_started_on,
            job_location: raw.job_location,
            job_still_working: raw.job_still_working,
            company_name: raw.company_name,
            company_industry: raw.company_industry,
            company_website: raw.company_website,
            company_size: raw.company_size,
            current_job_duration: raw.current_job_duration,
            address_with_country: raw.address_with_country,
            profile_pic_high_quality: raw.profile_pic_high_quality,
            background_pic: raw.background_pic,
            about: raw.about,
            birthday: raw.birthday,
            experiences: raw
                .experiences
                .map(|list| list.into_iter().map(ExperienceClean::from).collect()),
            // A skill without a title has nothing to flatten to.
            skills: raw
                .skills
                .map(|list| list.into_iter().filter_map(|skill| skill.title).collect()),
            educations: raw.educations,
            languages: raw.languages,
        }
    }
}

impl ProfileClean {
    /// The profile picture, if the scraper found a non-empty one.
    pub fn profile_picture(&self) -> Option<&str> {
        self.profile_pic_high_quality
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}
