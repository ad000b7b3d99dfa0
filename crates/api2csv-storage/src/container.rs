use crate::error::{Result, StorageError};
use api2csv_core::{decode_csv, encode_csv, ObjectPath, Table};
use opendal::Operator;

/// A single container (blob container, or top-level directory locally)
#[derive(Clone)]
pub struct Container {
    operator: Operator,
    account: String,
    name: String,
    prefix: String,
}

impl Container {
    pub(crate) fn new(operator: Operator, account: String, name: String, prefix: String) -> Self {
        Self {
            operator,
            account,
            name,
            prefix,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn key(&self, path: &ObjectPath) -> String {
        format!("{}{}", self.prefix, path)
    }

    /// `{account}/{container}/{folder}/{file}`
    pub fn uri(&self, path: &ObjectPath) -> String {
        format!("{}/{}/{}", self.account, self.name, path)
    }

    pub async fn exists(&self, path: &ObjectPath) -> Result<bool> {
        let key = self.key(path);
        match self.operator.stat(&key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::backend("stat", &key, e)),
        }
    }

    pub async fn read(&self, path: &ObjectPath) -> Result<Vec<u8>> {
        let key = self.key(path);
        let data = self
            .operator
            .read(&key)
            .await
            .map_err(|e| StorageError::backend("read", &key, e))?;
        Ok(data.to_vec())
    }

    /// Read an object, `None` when it does not exist.
    pub async fn read_optional(&self, path: &ObjectPath) -> Result<Option<Vec<u8>>> {
        match self.read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write (overwrite) an object.
    pub async fn write(&self, path: &ObjectPath, data: Vec<u8>) -> Result<()> {
        let key = self.key(path);
        let len = data.len();
        self.operator
            .write(&key, data)
            .await
            .map_err(|e| StorageError::backend("write", &key, e))?;
        tracing::debug!(container = %self.name, path = %key, bytes = len, "Object written");
        Ok(())
    }

    pub async fn delete(&self, path: &ObjectPath) -> Result<()> {
        let key = self.key(path);
        self.operator
            .delete(&key)
            .await
            .map_err(|e| StorageError::backend("delete", &key, e))?;
        tracing::debug!(container = %self.name, path = %key, "Object deleted");
        Ok(())
    }

    /// Encode a table as a CSV artifact and write it.
    pub async fn write_table(&self, path: &ObjectPath, table: &Table) -> Result<usize> {
        let bytes = encode_csv(table)?;
        let len = bytes.len();
        self.write(path, bytes).await?;
        Ok(len)
    }

    pub async fn read_table(&self, path: &ObjectPath) -> Result<Table> {
        let bytes = self.read(path).await?;
        Ok(decode_csv(&bytes)?)
    }
}
