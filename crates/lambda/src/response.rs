use serde::{Deserialize, Serialize};

pub const SKIPPED_MESSAGE: &str = "File already processed. Skipping.";
pub const PROCESSED_MESSAGE: &str =
    "File processed successfully and stored in the processed/ folder.";

/// Success result returned to the runtime. `body` holds JSON text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub status_code: u16,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_arn: Option<String>,
}

impl IngestResponse {
    pub fn skipped() -> Self {
        Self::ok(ResponseBody { message: SKIPPED_MESSAGE.to_owned(), execution_arn: None })
    }

    pub fn processed(execution_arn: String) -> Self {
        Self::ok(ResponseBody {
            message: PROCESSED_MESSAGE.to_owned(),
            execution_arn: Some(execution_arn),
        })
    }

    #[cfg(test)]
    pub fn parsed_body(&self) -> Option<ResponseBody> {
        serde_json::from_str(&self.body).ok()
    }

    fn ok(body: ResponseBody) -> Self {
        // ResponseBody only holds strings, so serialization cannot fail.
        let body = serde_json::to_string(&body).unwrap_or_default();
        Self { status_code: 200, body }
    }
}

/// Input handed to the downstream workflow execution.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput<'a> {
    pub bucket_name: &'a str,
    pub object_key: &'a str,
    pub file_preview: &'a str,
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{IngestResponse, WorkflowInput, PROCESSED_MESSAGE};

    #[test]
    fn processed_response_serializes_with_status_code_and_string_body() {
        let response = IngestResponse::processed("arn:aws:states:x:execution:etl:1".to_owned());

        let wire: Value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(wire["statusCode"], 200);
        let body: Value =
            serde_json::from_str(wire["body"].as_str().expect("body is text")).expect("body json");
        assert_eq!(body["message"], PROCESSED_MESSAGE);
        assert_eq!(body["executionArn"], "arn:aws:states:x:execution:etl:1");
    }

    #[test]
    fn skipped_response_omits_execution_arn() {
        let body = IngestResponse::skipped().parsed_body().expect("body");
        assert_eq!(body.execution_arn, None);
        assert!(!IngestResponse::skipped().body.contains("executionArn"));
    }

    #[test]
    fn workflow_input_uses_camel_case_keys() {
        let input = WorkflowInput {
            bucket_name: "drop",
            object_key: "processed/a.csv",
            file_preview: "First Name",
        };

        let wire: Value = serde_json::to_value(&input).expect("serialize");
        assert_eq!(wire["bucketName"], "drop");
        assert_eq!(wire["objectKey"], "processed/a.csv");
        assert_eq!(wire["filePreview"], "First Name");
    }
}
