//! DNSPod API 3.0 wire types (version 2021-03-23)

use serde::{Deserialize, Serialize};

/// API version sent in `X-TC-Version`
pub const API_VERSION: &str = "2021-03-23";

/// Error code returned by DescribeRecordList when nothing matches
pub const NO_DATA_OF_RECORD: &str = "ResourceNotFound.NoDataOfRecord";

/// Error code returned by ModifyRecord when the value is already current
pub const RECORD_VALUE_UNCHANGED: &str = "InvalidParameter.RecordValueInvalid";

/// API actions used by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    DescribeRecordList,
    CreateRecord,
    ModifyRecord,
}

impl Action {
    /// Value of the `X-TC-Action` header
    pub fn as_str(self) -> &'static str {
        match self {
            Action::DescribeRecordList => "DescribeRecordList",
            Action::CreateRecord => "CreateRecord",
            Action::ModifyRecord => "ModifyRecord",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeRecordListRequest<'a> {
    pub domain: &'a str,
    pub subdomain: &'a str,
    pub record_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRecordRequest<'a> {
    pub domain: &'a str,
    pub sub_domain: &'a str,
    pub record_type: &'a str,
    pub record_line: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyRecordRequest<'a> {
    pub domain: &'a str,
    pub sub_domain: &'a str,
    pub record_type: &'a str,
    pub record_line: &'a str,
    pub value: &'a str,
    pub record_id: u64,
}

/// Outer `{"Response": {...}}` wrapper of every reply
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope<T> {
    pub response: ResponseBody<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseBody<T> {
    #[serde(default)]
    pub error: Option<ApiError>,

    #[serde(default)]
    pub request_id: String,

    #[serde(flatten)]
    pub data: T,
}

/// API-level error carried in a 200 response
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordListData {
    #[serde(default)]
    pub record_list: Vec<ApiRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiRecord {
    pub record_id: u64,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "Type")]
    pub record_type: String,
    #[serde(default)]
    pub line: String,
}

/// Body of CreateRecord and ModifyRecord replies
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordIdData {
    #[serde(default)]
    pub record_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let list = serde_json::to_value(DescribeRecordListRequest {
            domain: "example.com",
            subdomain: "cf",
            record_type: "A",
        })
        .unwrap();
        assert_eq!(
            list,
            serde_json::json!({"Domain": "example.com", "Subdomain": "cf", "RecordType": "A"})
        );

        let modify = serde_json::to_value(ModifyRecordRequest {
            domain: "example.com",
            sub_domain: "cf",
            record_type: "AAAA",
            record_line: "默认",
            value: "2606:4700::1",
            record_id: 42,
        })
        .unwrap();
        assert_eq!(modify["SubDomain"], "cf");
        assert_eq!(modify["RecordLine"], "默认");
        assert_eq!(modify["RecordId"], 42);
    }

    #[test]
    fn test_parse_record_list() {
        let body = r#"{"Response":{"RecordCountInfo":{"TotalCount":1},"RecordList":[
            {"RecordId":556507778,"Value":"1.1.1.1","Name":"cf","Type":"A","Line":"默认","TTL":600}
        ],"RequestId":"ab4f1426"}}"#;

        let envelope: Envelope<RecordListData> = serde_json::from_str(body).unwrap();
        assert!(envelope.response.error.is_none());
        assert_eq!(envelope.response.request_id, "ab4f1426");
        let record = &envelope.response.data.record_list[0];
        assert_eq!(record.record_id, 556507778);
        assert_eq!(record.value, "1.1.1.1");
        assert_eq!(record.record_type, "A");
        assert_eq!(record.line, "默认");
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"{"Response":{"Error":{"Code":"ResourceNotFound.NoDataOfRecord","Message":"记录列表为空。"},"RequestId":"x"}}"#;

        let envelope: Envelope<RecordListData> = serde_json::from_str(body).unwrap();
        let error = envelope.response.error.unwrap();
        assert_eq!(error.code, NO_DATA_OF_RECORD);
        assert!(envelope.response.data.record_list.is_empty());
    }

    #[test]
    fn test_parse_record_id() {
        let body = r#"{"Response":{"RecordId":162,"RequestId":"x"}}"#;
        let envelope: Envelope<RecordIdData> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.response.data.record_id, Some(162));
    }
}
