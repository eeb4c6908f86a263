use serde::{Deserialize, Serialize};

/// Semantic role assigned to page content or controls during training.
///
/// Labels are process-wide constants; the wire name of a label is its
/// variant name (e.g. `"AuthorUsername"`), which is also how the agent
/// and the persistence layer key structural elements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    // navigation
    HomeButton,
    NextPageButton,
    PreviousPageButton,
    LoginButton,
    FirstThreadPageButton,
    // data
    AuthorUsername,
    AuthorNrOfPosts,
    AuthorPopularity,
    AuthorRegistrationDate,
    AuthorEmail,
    ThreadTitle,
    ThreadSection,
    ThreadAge,
    SectionTitle,
    SubsectionTitle,
    PostDate,
    PostContent,
    // input
    UsernameInput,
    PasswordInput,
    SearchInput,
    SubmitLoginButton,
}

/// Family a label belongs to: where you go, what you read, what you type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Navigation,
    Data,
    Input,
}

impl Label {
    pub fn kind(self) -> LabelKind {
        use Label::*;
        match self {
            HomeButton | NextPageButton | PreviousPageButton | LoginButton
            | FirstThreadPageButton => LabelKind::Navigation,
            AuthorUsername | AuthorNrOfPosts | AuthorPopularity | AuthorRegistrationDate
            | AuthorEmail | ThreadTitle | ThreadSection | ThreadAge | SectionTitle
            | SubsectionTitle | PostDate | PostContent => LabelKind::Data,
            UsernameInput | PasswordInput | SearchInput | SubmitLoginButton => LabelKind::Input,
        }
    }

    /// Text shown on the label button in the training screen.
    pub fn display_text(self) -> &'static str {
        use Label::*;
        match self {
            HomeButton => "Home button",
            NextPageButton => "Next-page button",
            PreviousPageButton => "Previous-page button",
            LoginButton => "Login button",
            FirstThreadPageButton => "First-thread-page button",
            AuthorUsername => "Author username",
            AuthorNrOfPosts => "Author post count",
            AuthorPopularity => "Author popularity",
            AuthorRegistrationDate => "Author registration date",
            AuthorEmail => "Author email",
            ThreadTitle => "Thread title",
            ThreadSection => "Thread section",
            ThreadAge => "Thread age",
            SectionTitle => "Section title",
            SubsectionTitle => "Subsection title",
            PostDate => "Post date",
            PostContent => "Post content",
            UsernameInput => "Username input",
            PasswordInput => "Password input",
            SearchInput => "Search input",
            SubmitLoginButton => "Submit-login button",
        }
    }

    /// Highlight color used when elements carrying this label are marked
    /// in the viewer. Stable across sessions so retraining looks familiar.
    pub fn display_color(self) -> &'static str {
        use Label::*;
        match self {
            HomeButton => "#e6194b",
            NextPageButton => "#3cb44b",
            PreviousPageButton => "#ffe119",
            LoginButton => "#4363d8",
            FirstThreadPageButton => "#f58231",
            AuthorUsername => "#911eb4",
            AuthorNrOfPosts => "#46f0f0",
            AuthorPopularity => "#f032e6",
            AuthorRegistrationDate => "#bcf60c",
            AuthorEmail => "#fabebe",
            ThreadTitle => "#008080",
            ThreadSection => "#e6beff",
            ThreadAge => "#9a6324",
            SectionTitle => "#fffac8",
            SubsectionTitle => "#800000",
            PostDate => "#aaffc3",
            PostContent => "#808000",
            UsernameInput => "#ffd8b1",
            PasswordInput => "#000075",
            SearchInput => "#808080",
            SubmitLoginButton => "#469990",
        }
    }

    /// Whether elements under this label carry a date the crawler must
    /// parse, and therefore accept an operator-supplied date format.
    pub fn holds_date(self) -> bool {
        matches!(
            self,
            Label::PostDate | Label::AuthorRegistrationDate | Label::ThreadAge
        )
    }
}

/// Structural category of a page on a forum platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageType {
    FrontPage,
    LoginPage,
    SectionPage,
    SubsectionPage,
    ThreadPage,
}

impl PageType {
    pub const ALL: [PageType; 5] = [
        PageType::FrontPage,
        PageType::LoginPage,
        PageType::SectionPage,
        PageType::SubsectionPage,
        PageType::ThreadPage,
    ];

    /// Ordered list of labels offered while training a page of this type.
    /// Every trained structure is total over this list.
    pub fn labels(self) -> &'static [Label] {
        use Label::*;
        match self {
            PageType::FrontPage => &[
                SectionTitle,
                SubsectionTitle,
                LoginButton,
                HomeButton,
                SearchInput,
            ],
            PageType::LoginPage => &[UsernameInput, PasswordInput, SubmitLoginButton, HomeButton],
            PageType::SectionPage => &[
                SectionTitle,
                SubsectionTitle,
                ThreadTitle,
                NextPageButton,
                PreviousPageButton,
                HomeButton,
            ],
            PageType::SubsectionPage => &[
                SubsectionTitle,
                ThreadTitle,
                ThreadSection,
                NextPageButton,
                PreviousPageButton,
                HomeButton,
            ],
            PageType::ThreadPage => &[
                ThreadTitle,
                PostContent,
                PostDate,
                AuthorUsername,
                AuthorNrOfPosts,
                AuthorPopularity,
                AuthorRegistrationDate,
                AuthorEmail,
                ThreadAge,
                NextPageButton,
                PreviousPageButton,
                FirstThreadPageButton,
                HomeButton,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_wire_name_is_variant_name() {
        let json = serde_json::to_string(&Label::AuthorUsername).unwrap();
        assert_eq!(json, "\"AuthorUsername\"");
        let back: Label = serde_json::from_str("\"NextPageButton\"").unwrap();
        assert_eq!(back, Label::NextPageButton);
    }

    #[test]
    fn page_type_wire_name_is_variant_name() {
        let json = serde_json::to_string(&PageType::ThreadPage).unwrap();
        assert_eq!(json, "\"ThreadPage\"");
    }

    #[test]
    fn every_page_type_offers_labels() {
        for pt in PageType::ALL {
            assert!(!pt.labels().is_empty());
        }
    }

    #[test]
    fn date_labels_are_data_labels() {
        for label in PageType::ThreadPage.labels() {
            if label.holds_date() {
                assert_eq!(label.kind(), LabelKind::Data);
            }
        }
    }

    #[test]
    fn colors_are_distinct_per_page_type() {
        for pt in PageType::ALL {
            let labels = pt.labels();
            for (i, a) in labels.iter().enumerate() {
                for b in &labels[i + 1..] {
                    assert_ne!(a.display_color(), b.display_color(), "{a:?} vs {b:?}");
                }
            }
        }
    }
}
