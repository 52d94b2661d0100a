/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(crate::status::view_status)
        .service(crate::webfinger::view_webfinger)
        .service(crate::user::view_me)
        .service(crate::bookmark::view_bookmarks)
        .service(crate::bookmark::create_bookmark_route)
        .service(crate::bookmark::delete_bookmark)
        .service(crate::gffft::create_gffft)
        .service(crate::gffft::update_gffft)
        .service(crate::gffft::browse_gfffts)
        .service(crate::gffft::rotate_fruit_code)
        .service(crate::gffft::toggle_gffft_feature)
        .service(crate::membership::join_gffft)
        .service(crate::membership::update_membership)
        .service(crate::membership::delete_membership)
        .service(crate::board::create_thread)
        .service(crate::board::view_threads)
        .service(crate::thread::view_thread)
        .service(crate::thread::create_post)
        .service(crate::thread::delete_thread)
        .service(crate::post::update_post)
        .service(crate::post::delete_post)
        .service(crate::gallery::create_gallery_item)
        .service(crate::gallery::like_gallery_item)
        .service(crate::gallery::view_gallery_items)
        .service(crate::gallery::delete_gallery_item)
        .service(crate::link_set::create_link_set_item)
        .service(crate::link_set::view_link_set_items)
        .service(crate::link_set::delete_link_set_item)
        .service(crate::collection::create_collection_post)
        .service(crate::collection::reply_collection_post)
        .service(crate::collection::react_collection_post)
        .service(crate::collection::view_collection_posts)
        .service(crate::collection::view_collection_replies)
        .service(crate::collection::delete_collection_post);
}
