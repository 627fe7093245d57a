use std::collections::HashSet;

use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    id::JurorId,
    juror::{Demographics, Juror},
    pagination::{Pagination, PaginationResult},
    pool::{JurorPool, PoolStats},
};

pub fn routes() -> Vec<Route> {
    routes![register_juror, list_jurors, pool_stats, get_juror]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    juror_id: JurorId,
    demographics: Demographics,
    categories: Option<HashSet<String>>,
}

#[derive(Debug, Serialize)]
struct PaginatedJurors {
    jurors: Vec<Juror>,
    pagination: PaginationResult,
}

/// Register the calling account as a juror. The account itself lives with
/// the account collaborator; this only enters the juror into the pool.
#[post("/jurors/register", data = "<request>", format = "json")]
async fn register_juror(
    request: Json<RegisterRequest>,
    pool: &State<JurorPool>,
) -> Result<Json<Juror>> {
    let request = request.into_inner();
    if request.demographics.is_empty() {
        return Err(Error::BadRequest(
            "Demographics information is required".to_string(),
        ));
    }
    let juror = Juror::new(
        request.juror_id,
        request.demographics,
        request.categories.unwrap_or_default(),
    );
    pool.register(juror.clone()).await?;
    Ok(Json(juror))
}

#[get("/jurors")]
async fn list_jurors(pagination: Pagination, pool: &State<JurorPool>) -> Json<PaginatedJurors> {
    let (jurors, total) = pool.list(pagination.skip(), pagination.page_size()).await;
    Json(PaginatedJurors {
        jurors,
        pagination: pagination.result(total),
    })
}

#[get("/jurors/stats")]
async fn pool_stats(pool: &State<JurorPool>) -> Json<PoolStats> {
    Json(pool.stats().await)
}

#[get("/jurors/<id>", rank = 2)]
async fn get_juror(id: JurorId, pool: &State<JurorPool>) -> Result<Json<Juror>> {
    pool.get(&id)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("Juror with ID '{id}'")))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use crate::api::testing::{client, json_body, seed_pool};

    #[rocket::async_test]
    async fn register_then_fetch() {
        let client = client().await;

        let response = client
            .post("/jurors/register")
            .header(ContentType::JSON)
            .body(
                r#"{
                    "jurorId": "juror1",
                    "demographics": {"region": "Europe", "age_group": "25-34"},
                    "categories": ["Moral"]
                }"#,
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body = json_body(&response.into_string().await.unwrap());
        assert_eq!("active", body["status"]);
        assert_eq!(1.0, body["reliability"]);

        let response = client.get("/jurors/juror1").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let body = json_body(&response.into_string().await.unwrap());
        assert_eq!("Europe", body["demographics"]["region"]);

        assert_eq!(
            Status::NotFound,
            client.get("/jurors/juror2").dispatch().await.status()
        );
    }

    #[rocket::async_test]
    async fn registration_requires_demographics_and_a_fresh_id() {
        let client = client().await;

        let without_demographics = r#"{"jurorId": "juror1", "demographics": {}}"#;
        let response = client
            .post("/jurors/register")
            .header(ContentType::JSON)
            .body(without_demographics)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let valid = r#"{"jurorId": "juror1", "demographics": {"region": "Asia"}}"#;
        let register = |body: &'static str| {
            client
                .post("/jurors/register")
                .header(ContentType::JSON)
                .body(body)
        };
        assert_eq!(Status::Ok, register(valid).dispatch().await.status());
        assert_eq!(Status::BadRequest, register(valid).dispatch().await.status());
    }

    #[rocket::async_test]
    async fn listing_is_paginated() {
        let client = client().await;
        seed_pool(&client, 25).await;

        let response = client.get("/jurors?page_num=2&page_size=10").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let body = json_body(&response.into_string().await.unwrap());
        assert_eq!(10, body["jurors"].as_array().unwrap().len());
        assert_eq!(25, body["pagination"]["total"]);
        // Ordered by id: page two starts at the eleventh juror.
        assert_eq!("juror10", body["jurors"][0]["id"]);
    }

    #[rocket::async_test]
    async fn stats_summarise_the_pool() {
        let client = client().await;
        seed_pool(&client, 12).await;

        let response = client.get("/jurors/stats").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let body = json_body(&response.into_string().await.unwrap());
        assert_eq!(12, body["totalJurors"]);
        assert_eq!(12, body["activeJurors"]);
        assert_eq!(4, body["demographics"]["region"]["Europe"]);
        assert_eq!(3, body["demographics"]["age_group"]["18-24"]);
        assert_eq!(1.0, body["averageReliability"]);
    }
}
