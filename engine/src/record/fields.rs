//! Reserved field names shared by the built-in commands.

/// Primary text payload.
pub const MESSAGE: &str = "message";

/// Unique identifier of a record.
pub const ID: &str = "id";

/// Host name or address, as set by `addLocalHost`.
pub const HOST: &str = "host";

/// Event time, usually epoch millis or a formatted timestamp.
pub const TIMESTAMP: &str = "timestamp";

/// Raw input not yet parsed into structured fields.
pub const ATTACHMENT_BODY: &str = "_attachment_body";

/// MIME type of the attachment body.
pub const ATTACHMENT_MIME_TYPE: &str = "_attachment_mimetype";

/// Character set of the attachment body.
pub const ATTACHMENT_CHARSET: &str = "_attachment_charset";

/// Name (e.g. file name) of the attachment.
pub const ATTACHMENT_NAME: &str = "_attachment_name";

/// All attachment fields, in the order they are emitted.
pub const ATTACHMENT_FIELDS: [&str; 4] = [
    ATTACHMENT_BODY,
    ATTACHMENT_MIME_TYPE,
    ATTACHMENT_CHARSET,
    ATTACHMENT_NAME,
];

/// True for the `_attachment_*` fields.
pub fn is_attachment(name: &str) -> bool {
    ATTACHMENT_FIELDS.contains(&name)
}
