//! Canonical Hasher (component A).
//!
//! Pure functions turning message content, reaction sets, and member
//! profile fields into deterministic SHA-256 hashes (spec §4.A). Every
//! hash in this crate is SHA-256, hex-encoded lower-case when held as a
//! string.

use sha2::{Digest, Sha256};

use crate::cache::{Message, MessageContent, Reaction};
use crate::error::SyncError;
use crate::ids::Address;

/// `H(data)` — SHA-256 over raw bytes, hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_bytes(data))
}

/// `H(data)` — SHA-256 over raw bytes, raw 32 bytes.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Canonicalises a message's content into the deterministic string
/// described by the variant table in spec §4.A, then hashes it.
///
/// Unknown content variants fail with [`SyncError::UnsupportedContent`].
pub fn content_hash(message: &Message) -> Result<String, SyncError> {
    let canonical = canonicalize_content(&message.sender_id, &message.content)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

fn opt(s: &Option<String>) -> &str {
    s.as_deref().unwrap_or("")
}

fn canonicalize_content(sender_id: &Address, content: &MessageContent) -> Result<String, SyncError> {
    let sender = sender_id.as_str();
    let s = match content {
        MessageContent::Post { text, reply_id } => match reply_id {
            Some(r) => format!("{sender}:post:{text}:reply:{r}"),
            None => format!("{sender}:post:{text}"),
        },
        MessageContent::Embed {
            image_url,
            video_url,
            reply_id,
        } => {
            let image_url = opt(image_url);
            let video_url = opt(video_url);
            match reply_id {
                Some(r) => format!("{sender}:embed:{image_url}:{video_url}:reply:{r}"),
                None => format!("{sender}:embed:{image_url}:{video_url}"),
            }
        }
        MessageContent::Sticker {
            sticker_id,
            reply_id,
        } => match reply_id {
            Some(r) => format!("{sender}:sticker:{sticker_id}:reply:{r}"),
            None => format!("{sender}:sticker:{sticker_id}"),
        },
        MessageContent::EditMessage {
            orig_id,
            edited_text,
            edited_at,
        } => format!("{sender}:edit-message:{orig_id}:{edited_text}:{edited_at}"),
        MessageContent::RemoveMessage { remove_id } => {
            format!("{sender}:remove-message:{remove_id}")
        }
        MessageContent::Join => format!("{sender}:join"),
        MessageContent::Leave => format!("{sender}:leave"),
        MessageContent::Kick => format!("{sender}:kick"),
        MessageContent::Event { text } => format!("{sender}:event:{text}"),
        MessageContent::UpdateProfile {
            display_name,
            user_icon,
        } => {
            let display_name = opt(display_name);
            let user_icon = opt(user_icon);
            format!("{sender}:update-profile:{display_name}:{user_icon}")
        }
        MessageContent::Mute {
            target,
            action,
            mute_id,
        } => format!("{sender}:mute:{target}:{action}:{mute_id}"),
        MessageContent::Pin {
            target_message_id,
            action,
        } => format!("{sender}:pin:{target_message_id}:{action}"),
        MessageContent::Reaction { message_id, reaction } => {
            format!("{sender}:reaction:{message_id}:{reaction}")
        }
        MessageContent::RemoveReaction { message_id, reaction } => {
            format!("{sender}:remove-reaction:{message_id}:{reaction}")
        }
        MessageContent::DeleteConversation => format!("{sender}:delete-conversation"),
        MessageContent::Unsupported { kind } => {
            return Err(SyncError::UnsupportedContent(kind.clone()))
        }
    };
    Ok(s)
}

/// Hashes a message's reaction set: sorts reactions by `emojiId` ascending,
/// and within each reaction sorts `memberIds` ascending, then joins
/// (spec §4.A — `reactionsHash`).
pub fn reactions_hash(reactions: &[Reaction]) -> String {
    let mut sorted: Vec<&Reaction> = reactions.iter().collect();
    sorted.sort_by(|a, b| a.emoji_id.cmp(&b.emoji_id));

    let parts: Vec<String> = sorted
        .into_iter()
        .map(|r| format!("{}:{}", r.emoji_id, members_hash(&r.member_ids)))
        .collect();

    sha256_hex(parts.join("\n").as_bytes())
}

/// `H(sorted(memberIds) joined with ",")` (spec §3 — `ReactionDigest`).
pub fn members_hash(member_ids: &[Address]) -> String {
    let mut sorted: Vec<&str> = member_ids.iter().map(Address::as_str).collect();
    sorted.sort_unstable();
    sha256_hex(sorted.join(",").as_bytes())
}

/// `H(displayName ∥ "")` used for [`crate::digest::MemberDigest::display_name_hash`].
pub fn display_name_hash(display_name: &str) -> String {
    sha256_hex(display_name.as_bytes())
}

/// `H(profileImage ∥ "")` used for [`crate::digest::MemberDigest::icon_hash`].
pub fn icon_hash(profile_image: &str) -> String {
    sha256_hex(profile_image.as_bytes())
}

/// `H(messageId)` — the term XORed into the payload cache's commutative
/// manifest hash accumulator (spec §4.C).
pub fn id_hash_bytes(message_id: &crate::ids::MessageId) -> [u8; 32] {
    sha256_bytes(message_id.as_str().as_bytes())
}
