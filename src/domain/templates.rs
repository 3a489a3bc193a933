//! Outreach template registry
//!
//! Maps a lead's business type to the outreach template used for draft
//! emails. Business type is inferred from the organization name and notes
//! with a keyword classifier; the AI collaborator personalizes the chosen
//! template afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Business categories with a dedicated outreach template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    Coworking,
    EventSpace,
    CommunityCenter,
    FitnessCenter,
    ArtStudio,
    Brewery,
    MusicVenue,
    WellnessCenter,
    General,
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusinessType::Coworking => "coworking",
            BusinessType::EventSpace => "event_space",
            BusinessType::CommunityCenter => "community_center",
            BusinessType::FitnessCenter => "fitness_center",
            BusinessType::ArtStudio => "art_studio",
            BusinessType::Brewery => "brewery",
            BusinessType::MusicVenue => "music_venue",
            BusinessType::WellnessCenter => "wellness_center",
            BusinessType::General => "general",
        };
        f.write_str(name)
    }
}

/// One outreach template. `subject` carries a `{business_name}`
/// placeholder filled in at personalization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub business_type: BusinessType,
    pub subject: String,
    pub pitch: String,
    pub extra_context: String,
}

/// Keyword groups checked against org name + notes, first match wins.
/// Ordered so the more specific categories are tried before broad ones.
const KEYWORD_RULES: &[(BusinessType, &[&str])] = &[
    (BusinessType::Coworking, &["coworking", "co-working", "shared office", "workspace"]),
    (BusinessType::Brewery, &["brewery", "brewing", "taproom", "brewpub"]),
    (BusinessType::MusicVenue, &["music venue", "concert", "live music", "stage"]),
    (BusinessType::ArtStudio, &["art studio", "gallery", "pottery", "artist"]),
    (BusinessType::FitnessCenter, &["fitness", "gym", "crossfit", "yoga", "pilates", "climbing"]),
    (BusinessType::WellnessCenter, &["wellness", "spa", "meditation", "massage", "holistic"]),
    (BusinessType::EventSpace, &["event space", "event venue", "banquet", "conference"]),
    (BusinessType::CommunityCenter, &["community center", "community centre", "recreation", "ymca"]),
];

/// Infers the business type of a lead from its name and notes.
#[must_use]
pub fn classify_business(org_name: &str, notes: &str) -> BusinessType {
    let haystack = format!("{org_name} {notes}").to_lowercase();
    for (business_type, keywords) in KEYWORD_RULES {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return *business_type;
        }
    }
    BusinessType::General
}

/// Returns the outreach template for a business type.
#[must_use]
pub fn template_for(business_type: BusinessType) -> EmailTemplate {
    let (subject, pitch, extra_context) = match business_type {
        BusinessType::Coworking => (
            "Digital Third Place for {business_name}",
            "A digital third place for your coworking community that complements your physical space.",
            "Pitch an online community around the physical space to lift regular attendance, engagement, and retention.",
        ),
        BusinessType::EventSpace => (
            "Community Platform for {business_name} Events",
            "A vibrant online community around your events and venue.",
            "Pitch an online community around events and the venue to lift attendance and repeat bookings.",
        ),
        BusinessType::CommunityCenter => (
            "Digital Community Hub for {business_name}",
            "A dedicated digital space that extends your community's reach between visits.",
            "Pitch an online hub around the physical space to lift event attendance and member retention.",
        ),
        BusinessType::FitnessCenter => (
            "Digital Fitness Community for {business_name}",
            "A motivational community that keeps members engaged between workouts.",
            "Pitch an online community around classes and programs to lift attendance, accountability, and retention.",
        ),
        BusinessType::ArtStudio => (
            "Creative Community Platform for {business_name}",
            "An inspiring creative community that connects your artists beyond the studio.",
            "Pitch an online community around workshops and exhibitions to lift participation and sales.",
        ),
        BusinessType::Brewery => (
            "Craft Beer Community for {business_name}",
            "A passionate community of enthusiasts around your taproom.",
            "Pitch an online community around tastings and releases to lift event attendance and loyalty.",
        ),
        BusinessType::MusicVenue => (
            "Music Community Platform for {business_name}",
            "An engaged music community that keeps the energy going between shows.",
            "Pitch an online community around performances to lift ticket sales and fan engagement.",
        ),
        BusinessType::WellnessCenter => (
            "Wellness Community Hub for {business_name}",
            "A supportive wellness community that nurtures growth beyond sessions.",
            "Pitch an online community around programs and workshops to lift participation and client support.",
        ),
        BusinessType::General => (
            "Online Community for {business_name}",
            "A dedicated online community around what you already do in person.",
            "Generic pitch: an online community around the business to lift engagement and retention.",
        ),
    };

    EmailTemplate {
        business_type,
        subject: subject.to_string(),
        pitch: pitch.to_string(),
        extra_context: extra_context.to_string(),
    }
}
