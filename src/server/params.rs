// Load-test parameter validation glue
//
// Raw query parameters as received on the wire; every field must be
// present and parse numerically before constraint validation runs.

use serde::Deserialize;

use crate::error::LoadTestError;
use crate::harness::LoadTestRequest;

#[derive(Debug, Clone, Deserialize)]
pub struct RawLoadTestParams {
    pub users: i64,
    pub spawn_rate: f64,
    pub test_time: f64,
}

impl RawLoadTestParams {
    /// Validate into a LoadTestRequest or a single error naming the
    /// failed constraint. No run starts on invalid input.
    pub fn into_request(self, max_users: u64) -> Result<LoadTestRequest, LoadTestError> {
        LoadTestRequest::try_new(self.users, self.spawn_rate, self.test_time, max_users)
    }
}
