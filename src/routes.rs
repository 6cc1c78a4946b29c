use crate::{
    api::{payroll, salary_structure},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let burst = requests_per_min.max(1);

    // per_ms and burst are both non-zero, the only inputs `finish` rejects
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(web::resource("").route(web::get().to(payroll::list_payrolls)))
                    // /payroll/breakup
                    .service(
                        web::resource("/breakup")
                            .route(web::post().to(salary_structure::preview_breakup)),
                    )
                    // /payroll/run
                    .service(
                        web::resource("/run").route(web::post().to(payroll::run_monthly_payroll)),
                    )
                    // /payroll/structure/{employee_id}
                    .service(
                        web::resource("/structure/{employee_id}")
                            .route(web::get().to(salary_structure::get_structure))
                            .route(web::put().to(salary_structure::revise_structure)),
                    )
                    // /payroll/structure/{employee_id}/history
                    .service(
                        web::resource("/structure/{employee_id}/history")
                            .route(web::get().to(salary_structure::structure_history)),
                    )
                    // /payroll/structure/{employee_id}/breakup
                    .service(
                        web::resource("/structure/{employee_id}/breakup")
                            .route(web::get().to(salary_structure::employee_breakup)),
                    )
                    // /payroll/payslip/{employee_id}/{month}
                    .service(
                        web::resource("/payslip/{employee_id}/{month}")
                            .route(web::get().to(payroll::get_payslip)),
                    )
                    // /payroll/{id}
                    .service(web::resource("/{id}").route(web::get().to(payroll::get_payroll))),
            ),
    );
}
