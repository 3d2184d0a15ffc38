use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_provider_customers},
};
use domain::{
    entities::payment_provider_customers::InsertPaymentProviderCustomerEntity,
    repositories::payment_provider_customers::PaymentProviderCustomerRepository,
};

pub struct PaymentProviderCustomerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentProviderCustomerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for PaymentProviderCustomerPostgres {
    async fn find_customer_ref(&self, user_id: Uuid, provider: &str) -> Result<Option<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let existing = payment_provider_customers::table
            .filter(payment_provider_customers::user_id.eq(user_id))
            .filter(payment_provider_customers::provider.eq(provider))
            .select(payment_provider_customers::customer_ref)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(existing)
    }

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        if let Some(existing_id) = payment_provider_customers::table
            .filter(payment_provider_customers::user_id.eq(user_id))
            .filter(payment_provider_customers::provider.eq(provider))
            .select(payment_provider_customers::id)
            .first::<Uuid>(&mut conn)
            .optional()?
        {
            update(
                payment_provider_customers::table
                    .filter(payment_provider_customers::id.eq(existing_id)),
            )
            .set(payment_provider_customers::customer_ref.eq(customer_ref))
            .execute(&mut conn)?;
            return Ok(());
        }

        let insert_entity = InsertPaymentProviderCustomerEntity {
            user_id,
            provider: provider.to_string(),
            customer_ref: customer_ref.to_string(),
            metadata: json!({}),
        };

        insert_into(payment_provider_customers::table)
            .values(&insert_entity)
            .execute(&mut conn)?;

        Ok(())
    }
}
