//! Onboarding flow: résumé upload, section extraction, profile creation.

pub mod handlers;
