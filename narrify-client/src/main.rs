//! Narrify shell entry point.

use narrify_client::api_client::RestClient;
use narrify_client::cache::{KeyFilter, QueryStatus};
use narrify_client::commands::{self, Command, HELP};
use narrify_client::config::ClientConfig;
use narrify_client::consumers::{
    Dashboard, EditorAccess, EditorForm, FeedView, HomeFeed, NavIndicator, NavLink, PostDetail,
    PostEditor, PostRow,
};
use narrify_client::events::ShellEvent;
use narrify_client::logging::init_logging;
use narrify_client::notifications::{Notification, NotificationLevel};
use narrify_client::persistence::FileMedium;
use narrify_client::session_watch::spawn_session_watcher;
use narrify_client::{AppContext, ClientError, ConsumerSettings};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc, watch};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    init_logging(config.log_filter.as_deref())?;

    let api = RestClient::new(&config)?;
    let medium = Arc::new(FileMedium::new(config.session_path.clone()));
    let ctx = AppContext::new(Arc::new(api), medium, ConsumerSettings::from(&config));
    let watcher = spawn_session_watcher(Arc::clone(&ctx.session), config.session_poll_interval());

    let mut shell = Shell::new(ctx);
    let follower = shell.feed.follow();

    let (event_tx, mut event_rx) = mpsc::channel::<ShellEvent>(64);
    spawn_input_reader(event_tx.clone());
    spawn_search_forwarder(shell.feed.search().committed_changes(), event_tx);
    let mut auth_rx = shell.ctx.bus().receiver();

    shell.render_nav();
    shell.show_feed().await;

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                if shell.handle(event).await {
                    break;
                }
            }
            signal = auth_rx.recv() => match signal {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    shell.handle(ShellEvent::AuthChanged).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            else => break,
        }
    }

    follower.abort();
    watcher.abort();
    Ok(())
}

fn spawn_input_reader(sender: mpsc::Sender<ShellEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if sender.send(ShellEvent::Line(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    let _ = sender.send(ShellEvent::InputClosed).await;
                    break;
                }
            }
        }
    });
}

fn spawn_search_forwarder(mut changes: watch::Receiver<String>, sender: mpsc::Sender<ShellEvent>) {
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let committed = changes.borrow_and_update().clone();
            if sender.send(ShellEvent::SearchCommitted(committed)).await.is_err() {
                break;
            }
        }
    });
}

/// Multi-line input for the post editor.
enum Prompt {
    Title(EditorForm),
    Content(EditorForm),
}

struct Shell {
    ctx: AppContext,
    nav: NavIndicator,
    feed: Arc<HomeFeed>,
    dashboard: Dashboard,
    editor: PostEditor,
    prompt: Option<Prompt>,
}

impl Shell {
    fn new(ctx: AppContext) -> Self {
        Self {
            nav: NavIndicator::attach(&ctx.session),
            feed: Arc::new(HomeFeed::new(&ctx)),
            dashboard: Dashboard::attach(&ctx),
            editor: PostEditor::new(&ctx),
            prompt: None,
            ctx,
        }
    }

    /// Returns `true` when the shell should exit.
    async fn handle(&mut self, event: ShellEvent) -> bool {
        match event {
            ShellEvent::Line(line) => {
                if let Some(prompt) = self.prompt.take() {
                    self.continue_prompt(prompt, line).await;
                    return false;
                }
                match commands::parse(&line) {
                    Ok(Some(command)) => return self.run(command).await,
                    Ok(None) => {}
                    Err(err) => notify(Notification::new(NotificationLevel::Warning, err.to_string())),
                }
            }
            ShellEvent::AuthChanged => self.render_nav(),
            ShellEvent::SearchCommitted(_) => self.show_feed().await,
            ShellEvent::InputClosed => return true,
        }
        false
    }

    async fn run(&mut self, command: Command) -> bool {
        match command {
            Command::Login { username, password } => {
                match self.ctx.auth.login(&username, &password).await {
                    Ok(who) => notify(Notification::new(
                        NotificationLevel::Success,
                        format!("Logged in as {}", who),
                    )),
                    Err(err) => notify(Notification::from_error("Login failed", &err)),
                }
            }
            Command::Register { username, email, password } => {
                match self.ctx.auth.register(&username, &email, &password).await {
                    Ok(profile) => notify(Notification::new(
                        NotificationLevel::Success,
                        format!("Registered {}; now log in", profile.username),
                    )),
                    Err(err) => notify(Notification::from_error("Registration failed", &err)),
                }
            }
            Command::Logout => {
                self.ctx.auth.logout();
                notify(Notification::new(NotificationLevel::Info, "Logged out"));
            }
            Command::WhoAmI => match self.ctx.auth.me().await {
                Ok(profile) => println!("{} <{}>", profile.username, profile.email),
                Err(err) => notify(Notification::from_error("Who am I", &err)),
            },
            Command::Search(text) => {
                self.feed.set_search(text);
            }
            Command::Feed => self.show_feed().await,
            Command::More => {
                self.feed.load_more();
                self.show_feed().await;
            }
            Command::Mine => self.show_dashboard().await,
            Command::Show(id) => {
                let detail = PostDetail::new(&self.ctx, id);
                match detail.settled_view().await {
                    Ok(view) => match (&view.post, &view.error) {
                        (Some(post), _) => {
                            println!("#{} {}", post.id, post.title);
                            println!(
                                "by {} on {}",
                                post.author_username.as_deref().unwrap_or("unknown"),
                                post.created_at.format("%Y-%m-%d %H:%M")
                            );
                            println!("\n{}\n", post.content);
                            if view.can_modify {
                                println!("(yours: 'edit {0}' or 'delete {0}')", post.id);
                            }
                        }
                        (None, Some(error)) => {
                            notify(Notification::new(NotificationLevel::Error, error.to_string()))
                        }
                        (None, None) => println!("Post not found"),
                    },
                    Err(err) => notify(Notification::from_error("Load failed", &err)),
                }
            }
            Command::New => match self.editor.open_new() {
                Ok(form) => {
                    println!("title:");
                    self.prompt = Some(Prompt::Title(form));
                }
                Err(err) => notify(Notification::from_error("New post", &err)),
            },
            Command::Edit(id) => match self.editor.open_existing(id).await {
                Ok(EditorAccess::Editable(form)) => {
                    println!("title [{}]:", form.title);
                    self.prompt = Some(Prompt::Title(form));
                }
                Ok(EditorAccess::NotFound) => {
                    notify(Notification::new(NotificationLevel::Warning, format!("Post {} not found", id)))
                }
                Ok(EditorAccess::Forbidden) => notify(Notification::new(
                    NotificationLevel::Warning,
                    format!("Post {} belongs to someone else", id),
                )),
                Ok(EditorAccess::LoginRequired) => {
                    notify(Notification::from_error("Edit", &ClientError::LoginRequired))
                }
                Err(err) => notify(Notification::from_error("Edit", &err)),
            },
            Command::Delete(id) => match self.ctx.mutations.delete(id).await {
                Ok(()) => notify(Notification::new(
                    NotificationLevel::Success,
                    format!("Deleted post {}", id),
                )),
                Err(err) => notify(Notification::from_error("Delete failed", &err)),
            },
            Command::Refresh => {
                let count = self.ctx.cache.invalidate(&KeyFilter::matching(|_| true));
                notify(Notification::new(
                    NotificationLevel::Info,
                    format!("Refreshing {} entries", count),
                ));
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return true,
        }
        false
    }

    async fn continue_prompt(&mut self, prompt: Prompt, line: String) {
        match prompt {
            Prompt::Title(mut form) => {
                if !line.trim().is_empty() || form.title.is_empty() {
                    form.title = line;
                }
                if form.content.is_empty() {
                    println!("content:");
                } else {
                    println!("content [{} chars, blank keeps]:", form.content.chars().count());
                }
                self.prompt = Some(Prompt::Content(form));
            }
            Prompt::Content(mut form) => {
                if !line.trim().is_empty() || form.content.is_empty() {
                    form.content = line;
                }
                match self.editor.submit(&form).await {
                    Ok(post) => notify(Notification::new(
                        NotificationLevel::Success,
                        format!("Saved post {}", post.id),
                    )),
                    Err(err) => notify(Notification::from_error("Save failed", &err)),
                }
            }
        }
    }

    fn render_nav(&self) {
        let links: Vec<String> = self
            .nav
            .state()
            .links
            .iter()
            .map(|link| match link {
                NavLink::Home => "home".to_string(),
                NavLink::MyPosts => "mine".to_string(),
                NavLink::Logout(who) => format!("logout ({})", who),
                NavLink::Login => "login".to_string(),
                NavLink::Register => "register".to_string(),
            })
            .collect();
        println!("== Narrify == {}", links.join(" | "));
    }

    async fn show_feed(&self) {
        match self.feed.settled_view().await {
            Ok(view) => print_feed(&view),
            Err(err) => notify(Notification::from_error("Feed", &err)),
        }
    }

    async fn show_dashboard(&self) {
        match self.dashboard.settled_view().await {
            Ok(view) if !view.logged_in => {
                notify(Notification::from_error("My posts", &ClientError::LoginRequired))
            }
            Ok(view) => {
                if let Some(error) = &view.error {
                    notify(Notification::new(
                        NotificationLevel::Error,
                        format!("Error loading posts: {}", error),
                    ));
                }
                if view.rows.is_empty() && view.status == QueryStatus::Success {
                    println!("You haven't created any posts yet. Use 'new' to write one.");
                }
                for row in &view.rows {
                    print_row(row);
                }
            }
            Err(err) => notify(Notification::from_error("My posts", &err)),
        }
    }
}

fn print_feed(view: &FeedView) {
    let search = if view.search.is_empty() {
        String::new()
    } else {
        format!(" matching '{}'", view.search)
    };
    println!("{} posts{}", view.total, search);
    if let Some(error) = &view.error {
        notify(Notification::new(NotificationLevel::Error, error.to_string()));
    }
    for row in &view.rows {
        print_row(row);
    }
    if view.has_more {
        println!("('more' to load more)");
    }
}

fn print_row(row: &PostRow) {
    let mark = if row.can_edit { " *" } else { "" };
    println!(
        "#{} {}{} by {} on {}",
        row.id,
        row.title,
        mark,
        row.author.as_deref().unwrap_or("unknown"),
        row.created_at.format("%Y-%m-%d")
    );
    println!("    {}", row.excerpt);
}

fn notify(notification: Notification) {
    println!("{}", notification);
}
