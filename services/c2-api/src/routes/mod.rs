pub mod common;
pub mod eoc;
pub mod health;
pub mod rooms;
pub mod sse;
pub mod status;
pub mod tasks;
pub mod timeline;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(status::status)
        .service(rooms::list_rooms)
        .service(rooms::create_room)
        .service(rooms::get_room)
        .service(rooms::update_status)
        .service(rooms::add_agency)
        .service(rooms::close_room)
        .service(rooms::generate_brief)
        .service(tasks::list_tasks)
        .service(tasks::create_task)
        .service(tasks::pending_tasks)
        .service(tasks::overdue_tasks)
        .service(tasks::auto_assign)
        .service(tasks::get_task)
        .service(tasks::assign_task)
        .service(tasks::start_task)
        .service(tasks::complete_task)
        .service(tasks::block_task)
        .service(tasks::cancel_task)
        .service(sse::timeline_stream)
        .service(timeline::timeline)
        .service(timeline::append_event)
        .service(eoc::eoc_status)
        .service(eoc::activate_eoc)
        .service(eoc::deactivate_eoc)
        .service(eoc::update_eoc_status)
        .service(eoc::join_eoc)
        .service(eoc::list_agencies)
        .service(eoc::register_agency)
        .service(eoc::get_agency)
        .service(eoc::list_resource_requests)
        .service(eoc::request_resources);
}
