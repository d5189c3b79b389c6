#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub next_continuation_token: Option<String>,
}

pub trait ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String>;

    fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, String>;

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), String>;
}
