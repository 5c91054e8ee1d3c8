use actix_web::web::ServiceConfig;

mod health;
mod status;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.configure(health::routes).configure(status::routes);
}
