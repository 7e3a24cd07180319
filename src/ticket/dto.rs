//! Wire representations of tickets.
//!
//! Two encodings are spoken on every surface, REST and websocket alike:
//! JSON, and form-urlencoded for clients whose embedded runtimes cannot
//! parse JSON. The Accept header picks the encoding per connection and it
//! is then used in both directions.
//!
//! Mentees get the narrow [`TicketDto`]; mentors get [`MentorTicketDto`]
//! with the request metadata. Session URLs are stored but never serialized
//! out, they can contain join secrets.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ticket::model::{Ticket, TicketStatus};
use crate::types::{HelplineError, Result};

/// Payload encoding negotiated from the Accept header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    UrlEncoded,
}

impl PayloadFormat {
    /// `application/json` anywhere in the Accept value selects JSON;
    /// everything else (including no header at all) falls back to
    /// urlencoded, the legacy in-world clients never send Accept.
    pub fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(value) if value.contains("application/json") => PayloadFormat::Json,
            _ => PayloadFormat::UrlEncoded,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "application/json",
            PayloadFormat::UrlEncoded => "application/x-www-form-urlencoded",
        }
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            PayloadFormat::Json => serde_json::to_string(value)
                .map_err(|e| HelplineError::Payload(format!("JSON encode failed: {}", e))),
            PayloadFormat::UrlEncoded => serde_urlencoded::to_string(value)
                .map_err(|e| HelplineError::Payload(format!("urlencoded encode failed: {}", e))),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        match self {
            PayloadFormat::Json => serde_json::from_str(text)
                .map_err(|e| HelplineError::Payload(format!("JSON decode failed: {}", e))),
            PayloadFormat::UrlEncoded => serde_urlencoded::from_str(text)
                .map_err(|e| HelplineError::Payload(format!("urlencoded decode failed: {}", e))),
        }
    }
}

/// What a mentee sees of their own ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDto {
    pub ticket: String,
    /// Display name only; mentee clients have no use for mentor ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor: Option<String>,
    pub status: TicketStatus,
}

/// What the mentor surfaces see: the mentee view plus request metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorTicketDto {
    pub ticket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor: Option<String>,
    pub status: TicketStatus,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,
    pub user_id: String,
    pub user_name: String,
}

impl Ticket {
    pub fn to_dto(&self) -> TicketDto {
        TicketDto {
            ticket: self.id.clone(),
            mentor: self.mentor.as_ref().map(|m| m.name.clone()),
            status: self.status,
        }
    }

    pub fn to_mentor_dto(&self) -> MentorTicketDto {
        MentorTicketDto {
            ticket: self.id.clone(),
            mentor: self.mentor.as_ref().map(|m| m.name.clone()),
            status: self.status,
            created: self.created.to_rfc3339(),
            lang: self.lang.clone(),
            desc: self.desc.clone(),
            session: self.session.clone(),
            session_id: self.session_id.clone(),
            mentor_id: self.mentor.as_ref().map(|m| m.id.clone()),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::model::{MentorRef, TicketEvent};
    use chrono::Utc;

    fn ticket() -> Ticket {
        Ticket {
            id: "0".to_string(),
            status: TicketStatus::Requested,
            user_id: "U-1".to_string(),
            user_name: "Bo".to_string(),
            lang: None,
            desc: None,
            session: None,
            session_id: None,
            session_url: Some("neos-session://secret".to_string()),
            session_web_url: None,
            mentor: None,
            created: Utc::now(),
            claimed: None,
            completed: None,
            canceled: None,
        }
    }

    #[test]
    fn fresh_ticket_urlencoded_payload() {
        let encoded = PayloadFormat::UrlEncoded.encode(&ticket().to_dto()).unwrap();
        assert_eq!(encoded, "ticket=0&status=requested");
    }

    #[test]
    fn fresh_ticket_json_payload() {
        let encoded = PayloadFormat::Json.encode(&ticket().to_dto()).unwrap();
        assert_eq!(encoded, r#"{"ticket":"0","status":"requested"}"#);
    }

    #[test]
    fn claimed_ticket_payload_names_the_mentor() {
        let claimed = ticket()
            .apply(
                &TicketEvent::Claim(MentorRef {
                    id: "M-1".to_string(),
                    name: "Ava".to_string(),
                }),
                Utc::now(),
            )
            .unwrap();
        let encoded = PayloadFormat::UrlEncoded.encode(&claimed.to_dto()).unwrap();
        assert_eq!(encoded, "ticket=0&mentor=Ava&status=responding");
    }

    #[test]
    fn mentor_dto_carries_metadata_but_never_session_urls() {
        let mut t = ticket();
        t.lang = Some("en".to_string());
        t.desc = Some("need help".to_string());
        t.session_id = Some("S-9".to_string());

        let json = PayloadFormat::Json.encode(&t.to_mentor_dto()).unwrap();
        assert!(json.contains("\"lang\":\"en\""));
        assert!(json.contains("\"desc\":\"need help\""));
        assert!(json.contains("\"sessionId\":\"S-9\""));
        assert!(json.contains("\"userId\":\"U-1\""));
        assert!(json.contains("\"userName\":\"Bo\""));
        assert!(!json.contains("sessionUrl"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn mentor_dto_omits_absent_fields() {
        let json = PayloadFormat::Json.encode(&ticket().to_mentor_dto()).unwrap();
        assert!(!json.contains("\"lang\""));
        assert!(!json.contains("\"desc\""));
        assert!(!json.contains("\"mentorId\""));
    }

    #[test]
    fn accept_header_negotiation() {
        assert_eq!(
            PayloadFormat::from_accept(Some("application/json")),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::from_accept(Some("application/json, text/plain")),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::from_accept(Some("text/plain")),
            PayloadFormat::UrlEncoded
        );
        assert_eq!(PayloadFormat::from_accept(None), PayloadFormat::UrlEncoded);
    }

    #[test]
    fn decode_round_trips_both_encodings() {
        let dto = TicketDto {
            ticket: "7".to_string(),
            mentor: Some("Ava".to_string()),
            status: TicketStatus::Responding,
        };
        for format in [PayloadFormat::Json, PayloadFormat::UrlEncoded] {
            let text = format.encode(&dto).unwrap();
            let back: TicketDto = format.decode(&text).unwrap();
            assert_eq!(back, dto);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(PayloadFormat::Json.decode::<TicketDto>("not json").is_err());
        assert!(PayloadFormat::UrlEncoded
            .decode::<TicketDto>("status=requested")
            .is_err());
    }
}
