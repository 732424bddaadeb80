//! `ListBucketResult` / `ListBucketResult` (v2) parsing (§3 Data Model, §4.2).
//!
//! Deserialization happens in two passes: `quick_xml::de` decodes the wire
//! document into a "raw" shape where every enum-typed field is still a
//! `String`, then `TryFrom` converts each raw struct into its typed
//! counterpart, producing a [`ParseErrorKind`] that names the exact
//! offending value rather than an opaque deserializer error. This mirrors
//! `types.cpp`'s explicit `string_to_*` conversion functions rather than
//! leaning on serde's generic enum deserialization, which only reports "no
//! matching variant" without the value.

use serde::{Deserialize, Serialize};

use crate::error::ParseErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Standard,
    ReducedRedundancy,
    Glacier,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    DeepArchive,
    Outposts,
    GlacierIr,
    Snow,
    ExpressOnezone,
    FsxOpenzfs,
}

impl StorageClass {
    fn parse(raw: &str) -> Result<Self, ParseErrorKind> {
        Ok(match raw {
            "STANDARD" => Self::Standard,
            "REDUCED_REDUNDANCY" => Self::ReducedRedundancy,
            "GLACIER" => Self::Glacier,
            "STANDARD_IA" => Self::StandardIa,
            "ONEZONE_IA" => Self::OnezoneIa,
            "INTELLIGENT_TIERING" => Self::IntelligentTiering,
            "DEEP_ARCHIVE" => Self::DeepArchive,
            "OUTPOSTS" => Self::Outposts,
            "GLACIER_IR" => Self::GlacierIr,
            "SNOW" => Self::Snow,
            "EXPRESS_ONEZONE" => Self::ExpressOnezone,
            "FSX_OPENZFS" => Self::FsxOpenzfs,
            other => return Err(ParseErrorKind::UnknownEnum(other.to_string())),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Self::Glacier => "GLACIER",
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::DeepArchive => "DEEP_ARCHIVE",
            Self::Outposts => "OUTPOSTS",
            Self::GlacierIr => "GLACIER_IR",
            Self::Snow => "SNOW",
            Self::ExpressOnezone => "EXPRESS_ONEZONE",
            Self::FsxOpenzfs => "FSX_OPENZFS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Crc32,
    Crc32c,
    Sha1,
    Sha256,
    Crc64Nvme,
}

impl ChecksumAlgorithm {
    fn parse(raw: &str) -> Result<Self, ParseErrorKind> {
        Ok(match raw {
            "CRC32" => Self::Crc32,
            "CRC32C" => Self::Crc32c,
            "SHA1" => Self::Sha1,
            "SHA256" => Self::Sha256,
            "CRC64NVME" => Self::Crc64Nvme,
            other => return Err(ParseErrorKind::UnknownEnum(other.to_string())),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Crc32c => "CRC32C",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Crc64Nvme => "CRC64NVME",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    Composite,
    FullObject,
}

impl ChecksumType {
    fn parse(raw: &str) -> Result<Self, ParseErrorKind> {
        Ok(match raw {
            "COMPOSITE" => Self::Composite,
            "FULL_OBJECT" => Self::FullObject,
            other => return Err(ParseErrorKind::UnknownEnum(other.to_string())),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Composite => "COMPOSITE",
            Self::FullObject => "FULL_OBJECT",
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, ParseErrorKind> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ParseErrorKind::InvalidBool(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub display_name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreStatus {
    pub is_restore_in_progress: bool,
    pub restore_expiry_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Absent when the server returned a `<Contents>` entry with no `<Key>`
    /// — a malformed entry the page is not aborted over (§4.7 edge case).
    pub key: Option<String>,
    pub etag: Option<String>,
    pub size: Option<u64>,
    pub last_modified: Option<String>,
    pub storage_class: Option<StorageClass>,
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    pub checksum_type: Option<ChecksumType>,
    pub owner: Option<Owner>,
    pub restore_status: Option<RestoreStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonPrefix {
    pub prefix: String,
}

/// The result of one page of a listing, either V1 or V2 (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ListingResult {
    pub common_prefixes: Vec<CommonPrefix>,
    pub contents: Vec<Object>,
    pub is_truncated: bool,
    /// V1 continuation cursor.
    pub next_marker: Option<String>,
    /// V2 continuation cursor.
    pub next_continuation_token: Option<String>,
}

impl ListingResult {
    /// The cursor to present on the next request, regardless of API
    /// version. `None` once the page is not truncated.
    pub fn next_token(&self) -> Option<&str> {
        self.next_continuation_token
            .as_deref()
            .or(self.next_marker.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    #[serde(rename = "DisplayName")]
    display_name: Option<String>,
    #[serde(rename = "ID")]
    id: Option<String>,
}

impl From<RawOwner> for Owner {
    fn from(raw: RawOwner) -> Self {
        Owner {
            display_name: raw.display_name,
            id: raw.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRestoreStatus {
    #[serde(rename = "IsRestoreInProgress")]
    is_restore_in_progress: Option<String>,
    #[serde(rename = "RestoreExpiryDate")]
    restore_expiry_date: Option<String>,
}

impl TryFrom<RawRestoreStatus> for RestoreStatus {
    type Error = ParseErrorKind;
    fn try_from(raw: RawRestoreStatus) -> Result<Self, ParseErrorKind> {
        Ok(RestoreStatus {
            is_restore_in_progress: raw
                .is_restore_in_progress
                .map(|s| parse_bool(&s))
                .transpose()?
                .unwrap_or(false),
            restore_expiry_date: raw.restore_expiry_date,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(rename = "Key")]
    key: Option<String>,
    #[serde(rename = "ETag")]
    etag: Option<String>,
    #[serde(rename = "Size")]
    size: Option<u64>,
    #[serde(rename = "LastModified")]
    last_modified: Option<String>,
    #[serde(rename = "StorageClass")]
    storage_class: Option<String>,
    #[serde(rename = "ChecksumAlgorithm")]
    checksum_algorithm: Option<String>,
    #[serde(rename = "ChecksumType")]
    checksum_type: Option<String>,
    #[serde(rename = "Owner")]
    owner: Option<RawOwner>,
    #[serde(rename = "RestoreStatus")]
    restore_status: Option<RawRestoreStatus>,
}

impl TryFrom<RawObject> for Object {
    type Error = ParseErrorKind;
    fn try_from(raw: RawObject) -> Result<Self, ParseErrorKind> {
        Ok(Object {
            key: raw.key,
            etag: raw.etag,
            size: raw.size,
            last_modified: raw.last_modified,
            storage_class: raw.storage_class.as_deref().map(StorageClass::parse).transpose()?,
            checksum_algorithm: raw
                .checksum_algorithm
                .as_deref()
                .map(ChecksumAlgorithm::parse)
                .transpose()?,
            checksum_type: raw.checksum_type.as_deref().map(ChecksumType::parse).transpose()?,
            owner: raw.owner.map(Owner::from),
            restore_status: raw.restore_status.map(RestoreStatus::try_from).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCommonPrefix {
    #[serde(rename = "Prefix")]
    prefix: String,
}

impl From<RawCommonPrefix> for CommonPrefix {
    fn from(raw: RawCommonPrefix) -> Self {
        CommonPrefix { prefix: raw.prefix }
    }
}

#[derive(Debug, Deserialize)]
struct RawListBucketResult {
    #[serde(rename = "IsTruncated")]
    is_truncated: Option<String>,
    #[serde(rename = "Marker")]
    #[allow(dead_code)]
    marker: Option<String>,
    #[serde(rename = "NextMarker")]
    next_marker: Option<String>,
    #[serde(rename = "ContinuationToken")]
    #[allow(dead_code)]
    continuation_token: Option<String>,
    #[serde(rename = "NextContinuationToken")]
    next_continuation_token: Option<String>,
    #[serde(rename = "CommonPrefixes", default)]
    common_prefixes: Vec<RawCommonPrefix>,
    #[serde(rename = "Contents", default)]
    contents: Vec<RawObject>,
}

fn parse_raw(xml: &str) -> Result<RawListBucketResult, ParseErrorKind> {
    quick_xml::de::from_str(xml).map_err(|err| {
        if !xml.contains("ListBucketResult") {
            ParseErrorKind::RootMissing
        } else {
            ParseErrorKind::Malformed(err.to_string())
        }
    })
}

fn into_listing_result(raw: RawListBucketResult) -> Result<ListingResult, ParseErrorKind> {
    let is_truncated = raw
        .is_truncated
        .as_deref()
        .map(parse_bool)
        .transpose()?
        .unwrap_or(false);

    let common_prefixes = raw.common_prefixes.into_iter().map(CommonPrefix::from).collect();
    let contents = raw
        .contents
        .into_iter()
        .map(Object::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    if is_truncated && raw.next_marker.is_none() && raw.next_continuation_token.is_none() {
        return Err(ParseErrorKind::MissingContinuation);
    }

    Ok(ListingResult {
        common_prefixes,
        contents,
        is_truncated,
        next_marker: raw.next_marker,
        next_continuation_token: raw.next_continuation_token,
    })
}

/// Parse a `ListObjects` (v1) response body.
pub fn parse_list_objects_v1(xml: &str) -> Result<ListingResult, ParseErrorKind> {
    into_listing_result(parse_raw(xml)?)
}

/// Parse a `ListObjectsV2` response body.
pub fn parse_list_objects_v2(xml: &str) -> Result<ListingResult, ParseErrorKind> {
    into_listing_result(parse_raw(xml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>example-bucket</Name>
  <Prefix>photos/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>abcdtoken</NextContinuationToken>
  <CommonPrefixes><Prefix>photos/2024/</Prefix></CommonPrefixes>
  <Contents>
    <Key>photos/a.jpg</Key>
    <LastModified>2024-08-31T12:00:00.000Z</LastModified>
    <ETag>"deadbeef"</ETag>
    <Size>1024</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#;

    #[test]
    fn parses_truncated_v2_page() {
        let result = parse_list_objects_v2(PAGE_ONE).unwrap();
        assert!(result.is_truncated);
        assert_eq!(result.next_token(), Some("abcdtoken"));
        assert_eq!(result.common_prefixes.len(), 1);
        assert_eq!(result.contents[0].key.as_deref(), Some("photos/a.jpg"));
        assert_eq!(result.contents[0].storage_class, Some(StorageClass::Standard));
    }

    #[test]
    fn truncated_without_token_is_missing_continuation() {
        let xml = r#"<ListBucketResult><IsTruncated>true</IsTruncated></ListBucketResult>"#;
        assert_eq!(
            parse_list_objects_v2(xml).unwrap_err(),
            ParseErrorKind::MissingContinuation
        );
    }

    #[test]
    fn missing_root_is_reported() {
        let xml = r#"<Error><Code>NoSuchBucket</Code></Error>"#;
        assert_eq!(parse_list_objects_v2(xml).unwrap_err(), ParseErrorKind::RootMissing);
    }

    #[test]
    fn unknown_storage_class_is_reported() {
        let xml = r#"<ListBucketResult><Contents><Key>k</Key><StorageClass>MOON</StorageClass></Contents></ListBucketResult>"#;
        assert_eq!(
            parse_list_objects_v2(xml).unwrap_err(),
            ParseErrorKind::UnknownEnum("MOON".to_string())
        );
    }

    #[test]
    fn contents_entry_missing_key_parses_as_none_without_aborting_the_page() {
        let xml = r#"<ListBucketResult><Contents><Size>10</Size></Contents><Contents><Key>b</Key></Contents></ListBucketResult>"#;
        let result = parse_list_objects_v2(xml).unwrap();
        assert_eq!(result.contents.len(), 2);
        assert_eq!(result.contents[0].key, None);
        assert_eq!(result.contents[1].key.as_deref(), Some("b"));
    }

    #[test]
    fn invalid_boolean_is_reported() {
        let xml = r#"<ListBucketResult><IsTruncated>maybe</IsTruncated></ListBucketResult>"#;
        assert_eq!(
            parse_list_objects_v2(xml).unwrap_err(),
            ParseErrorKind::InvalidBool("maybe".to_string())
        );
    }
}
