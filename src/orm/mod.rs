pub mod bookmarks;
pub mod boards;
pub mod calendars;
pub mod collection_posts;
pub mod collection_reactions;
pub mod collections;
pub mod galleries;
pub mod gallery_items;
pub mod gallery_likes;
pub mod gfffts;
pub mod link_set_items;
pub mod link_sets;
pub mod links;
pub mod member_counts;
pub mod memberships;
pub mod notebooks;
pub mod npc_actors;
pub mod posts;
pub mod threads;
pub mod users;
