use rocket::Route;

mod jurors;
mod sessions;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(sessions::routes());
    routes.extend(voting::routes());
    routes.extend(jurors::routes());
    routes
}
