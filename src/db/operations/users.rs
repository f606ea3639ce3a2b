use serde_json::{Map, Value};

use crate::db::{collections, FirestoreClient, StoreError};
use crate::models::User;

/// Persist a new user. The password hash is added back explicitly since
/// `User` never serializes it.
pub async fn create_user(client: &FirestoreClient, user: &User) -> Result<User, StoreError> {
    let mut fields = super::to_fields(user)?;
    if let Some(hash) = &user.password {
        fields.insert("password".to_string(), Value::String(hash.clone()));
    }

    let stored = client
        .create_document(collections::USERS, Some(&user.id), &fields)
        .await?;
    stored.into_typed("id")
}

pub async fn find_by_email(
    client: &FirestoreClient,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let matches = client
        .run_query(collections::USERS, "email", &Value::String(email.to_string()))
        .await?;
    match matches.into_iter().next() {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

pub async fn get_by_id(client: &FirestoreClient, id: &str) -> Result<Option<User>, StoreError> {
    match client.get_document(collections::USERS, id).await? {
        Some(doc) => Ok(Some(doc.into_typed("id")?)),
        None => Ok(None),
    }
}

/// Patch named fields on a user document and return the updated record.
pub async fn update_user(
    client: &FirestoreClient,
    id: &str,
    fields: Map<String, Value>,
) -> Result<User, StoreError> {
    let stored = client.patch_document(collections::USERS, id, &fields).await?;
    stored.into_typed("id")
}

pub async fn touch_updated_at(
    client: &FirestoreClient,
    id: &str,
    now: &str,
) -> Result<User, StoreError> {
    let mut fields = Map::new();
    fields.insert("updatedAt".to_string(), Value::String(now.to_string()));
    update_user(client, id, fields).await
}
