//! Request/response vocabulary exchanged between client and server.
//!
//! Each message travels as JSON in its own logical stream:
//! ```text
//! {"action":"login","username":"alice","passwordHash":"..."}
//! {"response":"successful"}
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crypto::{Key, wrap_for_decryption, wrap_for_encryption};
use crate::stream::{FrameReader, FrameWriter};

/// Well-known property names.
pub mod property {
    pub const USERNAME: &str = "username";
    pub const PASSWORD_HASH: &str = "passwordHash";
    pub const LOCATION: &str = "location";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    CreateUser,
    GetKeyFile,
    UpdateKeyFile,
    GetFile,
    UpdateFile,
    UploadFile,
    RemoveFile,
    Login,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Successful,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    Action(Action),
    Response(Response),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    kind: Kind,
    #[serde(flatten)]
    properties: BTreeMap<String, String>,
}

impl Message {
    pub fn request(action: Action) -> Self {
        Self {
            kind: Kind::Action(action),
            properties: BTreeMap::new(),
        }
    }

    pub fn response(response: Response) -> Self {
        Self {
            kind: Kind::Response(response),
            properties: BTreeMap::new(),
        }
    }

    /// Adds or replaces a property.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn action(&self) -> Option<Action> {
        match self.kind {
            Kind::Action(a) => Some(a),
            Kind::Response(_) => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Writes `message` as one logical stream on `sink`.
pub fn send<W: Write>(sink: &mut W, message: &Message) -> Result<()> {
    let mut out = FrameWriter::new(sink);
    serde_json::to_writer(&mut out, message).context("failed to serialize message")?;
    out.close()?;
    Ok(())
}

/// Reads the next logical stream from `source` and parses it as a message.
///
/// The stream is drained even when the message is rejected, so the next
/// message on the connection can still be received.
pub fn receive<R: Read>(source: &mut R) -> Result<Message> {
    let mut input = FrameReader::new(source);
    let parsed =
        serde_json::from_reader::<_, Message>(&mut input).context("failed to parse message");
    let drained = input.close();
    let message = parsed?;
    drained?;
    Ok(message)
}

/// Like [`send`], with the message content encrypted under `key`.
pub fn send_encrypted<W: Write>(sink: &mut W, message: &Message, key: &Key) -> Result<()> {
    let mut out = FrameWriter::new(sink);
    let mut sealed = wrap_for_encryption(&mut out, key)?;
    serde_json::to_writer(&mut sealed, message).context("failed to serialize message")?;
    sealed.finish()?;
    out.close()?;
    Ok(())
}

/// Like [`receive`], decrypting the content with `key`.
pub fn receive_encrypted<R: Read>(source: &mut R, key: &Key) -> Result<Message> {
    let mut input = FrameReader::new(source);
    let parsed = wrap_for_decryption(&mut input, key)
        .map_err(anyhow::Error::from)
        .and_then(|mut opened| {
            serde_json::from_reader::<_, Message>(&mut opened)
                .context("failed to decrypt message; possibly wrong key or corrupted data")
        });
    let drained = input.close();
    let message = parsed?;
    drained?;
    Ok(message)
}
