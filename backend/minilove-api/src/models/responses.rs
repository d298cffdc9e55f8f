//! Response DTOs. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use super::{parse_string_list, Comment, MembershipPlan, Post, User};

/// Standard success envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let limit = limit.max(1);
        let total_pages = (total + limit - 1) / limit;
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

// ============================================
// Users
// ============================================

/// Minimal identity returned on register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub membership_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserSummary {
    pub fn registered(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar_url: None,
            membership_level: user.membership_level.clone(),
            membership_expires_at: None,
            created_at: Some(user.created_at.clone()),
        }
    }

    pub fn signed_in(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            membership_level: user.membership_level.clone(),
            membership_expires_at: user.membership_expires_at.clone(),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub posts: i64,
    pub comments: i64,
    pub likes_given: i64,
    pub likes_received: i64,
    pub followers: i64,
    pub following: i64,
}

/// Full profile as seen by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub gender: String,
    pub age: Option<i64>,
    pub city: Option<String>,
    pub membership_level: String,
    pub membership_expires_at: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<UserStats>,
}

impl UserProfile {
    pub fn from_user(user: User, stats: Option<UserStats>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            avatar_url: user.avatar_url,
            bio: user.bio,
            gender: user.gender,
            age: user.age,
            city: user.city,
            membership_level: user.membership_level,
            membership_expires_at: user.membership_expires_at,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
            stats,
        }
    }
}

/// Profile as seen by other users: contact details are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub gender: String,
    pub city: Option<String>,
    pub membership_level: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<UserStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            avatar_url: user.avatar_url,
            bio: user.bio,
            gender: user.gender,
            city: user.city,
            membership_level: user.membership_level,
            created_at: user.created_at,
            stats: None,
            is_following: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope<U> {
    pub user: U,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
    pub pagination: Pagination,
}

// ============================================
// Posts & comments
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: i64,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub title: Option<String>,
    pub content: String,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub emotion_tags: Vec<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub views_count: i64,
    pub shares_count: i64,
    pub visibility: String,
    pub status: String,
    pub is_featured: bool,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bookmarked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<i64>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            images: parse_string_list(&post.images),
            tags: parse_string_list(&post.tags),
            emotion_tags: parse_string_list(&post.emotion_tags),
            content: post.content,
            category: post.category,
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            views_count: post.views_count,
            shares_count: post.shares_count,
            visibility: post.visibility,
            status: post.status,
            is_featured: post.is_featured,
            published_at: post.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
            author: Author {
                id: post.user_id,
                username: post.author_username,
                avatar_url: post.author_avatar,
                membership_level: post.author_membership_level,
            },
            is_liked: None,
            is_bookmarked: None,
            trending_score: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostList {
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostEnvelope {
    pub post: PostResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub likes_count: i64,
    pub status: String,
    pub is_edited: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentResponse>,
    pub reply_count: i64,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            content: comment.content,
            likes_count: comment.likes_count,
            status: comment.status,
            is_edited: comment.is_edited,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            author: Author {
                id: comment.user_id,
                username: comment.author_username,
                avatar_url: comment.author_avatar,
                membership_level: None,
            },
            replies: Vec::new(),
            reply_count: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentList {
    pub comments: Vec<CommentResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentEnvelope {
    pub comment: CommentResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterResponse {
    pub likes_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlanResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_days: i64,
    pub features: serde_json::Value,
}

impl From<MembershipPlan> for MembershipPlanResponse {
    fn from(plan: MembershipPlan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            description: plan.description,
            price: plan.price,
            duration_days: plan.duration_days,
            features: serde_json::from_str(&plan.features)
                .unwrap_or_else(|_| serde_json::json!({})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(45, 2, 20);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(p.has_prev_page);

        let last = Pagination::new(45, 3, 20);
        assert!(!last.has_next_page);

        let empty = Pagination::new(0, 1, 20);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_prev_page);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(1, 1, 20)).unwrap();
        assert!(json.get("totalPages").is_some());
        assert!(json.get("hasNextPage").is_some());
        assert!(json.get("hasPrevPage").is_some());
    }

    #[test]
    fn test_message_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("ok")).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("data").is_none());
    }
}
