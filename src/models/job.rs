use uuid::Uuid;

/// A unit of generation work travelling through the in-process queue.
///
/// Shares its `job_id` with the durable generation record created alongside it.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub user_id: i64,
    pub template_id: i64,
    pub image_data: Vec<u8>,
}

impl Job {
    pub fn new(user_id: i64, template_id: i64, image_data: Vec<u8>) -> Self {
        Self {
            job_id: new_job_id(),
            user_id,
            template_id,
            image_data,
        }
    }
}

/// UUID v4 in simple form: 32 lowercase hex characters carrying 122 random bits.
pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}
