use chrono::NaiveDateTime;
use rumqttc::Publish;
use std::fmt;

const PREVIEW_CHARS: usize = 32;

/// An inbound publish as text, stamped on arrival
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    topic: String,
    content: String,
    timestamp: NaiveDateTime,
}

impl fmt::Display for MqttMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - {}: {}", self.timestamp, self.topic, self.preview())
    }
}

impl MqttMessage {
    pub fn from_topic(topic: String, content: String) -> Self {
        MqttMessage {
            topic,
            content,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    /// Payload bytes that are not valid UTF-8 are replaced, the codec only
    /// deals in text.
    pub fn from_publish(publish: &Publish) -> Self {
        let content = String::from_utf8_lossy(&publish.payload).into_owned();
        Self::from_topic(publish.topic.clone(), content)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// First characters of the payload, for log lines.
    pub fn preview(&self) -> String {
        let mut chars = self.content.chars();
        let preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{}…", preview)
        } else {
            preview
        }
    }
}
