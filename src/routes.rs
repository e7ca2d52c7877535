use crate::{
    api::{attendance, cell, member, report, semester},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst are never zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(handlers::me)
            .service(
                web::scope("/cells")
                    // /cells
                    .service(
                        web::resource("")
                            .route(web::get().to(cell::list_cells))
                            .route(web::post().to(cell::create_cell)),
                    )
                    // /cells/{id}/members
                    .service(
                        web::resource("/{id}/members").route(web::get().to(cell::cell_members)),
                    ),
            )
            .service(
                web::scope("/members")
                    // /members
                    .service(
                        web::resource("")
                            .route(web::get().to(member::list_members))
                            .route(web::post().to(member::create_member)),
                    )
                    // /members/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(member::get_member))
                            .route(web::put().to(member::update_member))
                            .route(web::delete().to(member::delete_member)),
                    )
                    // /members/{id}/cell
                    .service(
                        web::resource("/{id}/cell").route(web::put().to(member::assign_cell)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::put().to(attendance::save_roll)),
                    ),
            )
            .service(
                web::scope("/semesters")
                    // /semesters
                    .service(
                        web::resource("")
                            .route(web::get().to(semester::list_semesters))
                            .route(web::post().to(semester::create_semester)),
                    )
                    // /semesters/current
                    .service(
                        web::resource("/current")
                            .route(web::get().to(semester::get_current_semester)),
                    ),
            )
            .service(
                web::scope("/reports")
                    // /reports/cells
                    .service(
                        web::resource("/cells").route(web::get().to(report::cells_completeness)),
                    )
                    // /reports/completeness
                    .service(
                        web::resource("/completeness")
                            .route(web::get().to(report::cell_completeness)),
                    )
                    // /reports/completeness/evaluate
                    .service(
                        web::resource("/completeness/evaluate")
                            .route(web::post().to(report::evaluate_completeness)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, old refresh token revoked

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_extreme_rates() {
        build_limiter(0);
        build_limiter(1);
        build_limiter(1_000_000);
    }
}
