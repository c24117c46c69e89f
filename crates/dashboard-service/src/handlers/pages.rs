//! Page surface.
//!
//! Minimal HTML shells. The browser scripts talk to the JSON API; all page
//! logic beyond that is out of scope for this service. `/dashboard` is
//! protected by the gate, the auth pages are public.

use axum::response::{Html, Redirect};

const LOGIN_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<form id="login-form">
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button type="submit">Sign in</button>
</form>
<p id="error" role="alert"></p>
<p><a href="/signup">Create an account</a></p>
<script>
document.getElementById("login-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  const res = await fetch("/api/auth/login", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ email: form.get("email"), password: form.get("password") }),
  });
  if (res.ok) { window.location.href = "/dashboard"; return; }
  const data = await res.json().catch(() => ({}));
  document.getElementById("error").textContent = data.error || "Sign in failed";
});
</script>
</body>
</html>
"#;

const SIGNUP_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Create account</title></head>
<body>
<h1>Create account</h1>
<form id="signup-form">
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button type="submit">Sign up</button>
</form>
<p id="error" role="alert"></p>
<script>
document.getElementById("signup-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  const email = form.get("email");
  const res = await fetch("/api/auth/signup", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ email, password: form.get("password") }),
  });
  const data = await res.json().catch(() => ({}));
  if (!res.ok) { document.getElementById("error").textContent = data.error || "Sign up failed"; return; }
  window.location.href = data.userConfirmed ? "/login" : "/confirm?email=" + encodeURIComponent(email);
});
</script>
</body>
</html>
"#;

const CONFIRM_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Confirm account</title></head>
<body>
<h1>Confirm account</h1>
<form id="confirm-form">
  <input name="email" type="email" placeholder="Email" required>
  <input name="code" placeholder="Verification code" required>
  <button type="submit">Confirm</button>
</form>
<p id="error" role="alert"></p>
<script>
const params = new URLSearchParams(window.location.search);
document.querySelector("[name=email]").value = params.get("email") || "";
document.getElementById("confirm-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  const res = await fetch("/api/auth/confirm", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ email: form.get("email"), code: form.get("code") }),
  });
  if (res.ok) { window.location.href = "/login"; return; }
  const data = await res.json().catch(() => ({}));
  document.getElementById("error").textContent = data.error || "Confirmation failed";
});
</script>
</body>
</html>
"#;

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Dashboard</title></head>
<body>
<header>
  <span id="who"></span>
  <button id="logout">Sign out</button>
</header>
<h1>Items</h1>
<table>
  <thead><tr><th>Name</th><th>Description</th><th>Status</th><th>Created</th></tr></thead>
  <tbody id="items"></tbody>
</table>
<script>
async function api(path, options) {
  const res = await fetch(path, options);
  if (res.status === 401) { window.location.href = "/login"; throw new Error("unauthorized"); }
  return res.json();
}
async function load() {
  const me = await api("/api/me");
  document.getElementById("who").textContent = me.email || me.username || me.sub;
  const { items } = await api("/api/items");
  const body = document.getElementById("items");
  body.replaceChildren(...items.map((item) => {
    const row = document.createElement("tr");
    for (const value of [item.name, item.description, item.status, item.createdAt]) {
      const cell = document.createElement("td");
      cell.textContent = value;
      row.appendChild(cell);
    }
    return row;
  }));
}
document.getElementById("logout").addEventListener("click", async () => {
  await fetch("/api/auth/logout", { method: "POST" });
  window.location.href = "/login";
});
load();
</script>
</body>
</html>
"#;

/// `GET /` sends signed-in users to the dashboard.
pub async fn root_redirect() -> Redirect {
    Redirect::to("/dashboard")
}

pub async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_HTML)
}

pub async fn signup_page() -> Html<&'static str> {
    Html(SIGNUP_HTML)
}

pub async fn confirm_page() -> Html<&'static str> {
    Html(CONFIRM_HTML)
}
