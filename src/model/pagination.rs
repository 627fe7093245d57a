use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::Serialize;

/// Pagination parameters, taken from the `page_num`/`page_size` query
/// parameters with sensible defaults.
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> usize {
        self.page_num.saturating_sub(1) * self.page_size
    }

    pub fn result(self, total: usize) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = match req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) => page_num,
            Err(_) => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let page_size = match req.query_value::<usize>("page_size").unwrap_or(Ok(20)) {
            Ok(page_size) => page_size,
            Err(_) => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        request::Outcome::Success(Self {
            page_num,
            page_size,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationResult {
    page_num: usize,
    page_size: usize,
    total: usize,
}
