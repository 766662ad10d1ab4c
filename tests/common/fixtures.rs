#![allow(dead_code)]

/// `playwright codegen --target python` output for a login flow.
pub const LOGIN_RECORDING: &str = r##"import re
from playwright.sync_api import Playwright, sync_playwright, expect


def run(playwright: Playwright) -> None:
    browser = playwright.chromium.launch(headless=False)
    context = browser.new_context()
    page = context.new_page()
    page.goto("https://the-internet.herokuapp.com/login")
    page.get_by_role("textbox", name="Username").click()
    page.get_by_role("textbox", name="Username").fill("tomsmith")
    page.get_by_role("textbox", name="Password").fill("SuperSecretPassword!")
    page.get_by_role("button", name="Login").click()
    expect(page.locator("#flash")).to_contain_text("You logged into a secure area!")

    # ---------------------
    context.close()
    browser.close()


with sync_playwright() as playwright:
    run(playwright)
"##;

/// Minimal snippet without any setup code.
pub const LOGIN_SNIPPET: &str = r#"goto("https://x/login")
get_by_role("textbox", name="Username").fill("tomsmith")
get_by_role("button", name="Login").click()
"#;

/// Recording that opens a second tab through an expect_popup block.
pub const POPUP_RECORDING: &str = r#"from playwright.sync_api import Playwright, sync_playwright, expect


def run(playwright: Playwright) -> None:
    browser = playwright.chromium.launch(headless=False)
    context = browser.new_context()
    page = context.new_page()
    page.goto("https://example.com/docs")
    with page.expect_popup() as page1_info:
        page.get_by_role("link", name="GitHub").click()
    page1 = page1_info.value
    page1.get_by_placeholder("Search").fill("playwright")
    page1.close()

    context.close()
    browser.close()


with sync_playwright() as playwright:
    run(playwright)
"#;

/// Existing behave step definitions.
pub const LOGIN_STEPS: &str = r#"from behave import given, when, then


@given('I am on the login page')
def step_on_login_page(context):
    context.page.goto(context.base_url + "/login")


@when('I click the login button')
def step_click_login(context):
    context.page.get_by_role("button", name="Login").click()


@when('I enter "{username}" as the username')
def step_enter_username(context, username):
    context.page.get_by_label("Username").fill(username)
"#;

/// Existing page object with one locator-rich `__init__` and one method.
pub const LOGIN_PAGE: &str = r#"from playwright.sync_api import Page

from .base_page import BasePage


class LoginPage(BasePage):
    def __init__(self, page: Page):
        super().__init__(page)
        self.page = page
        self.username_input = page.get_by_role("textbox", name="Username")
        self.login_button = page.get_by_role("button", name="Login")

    def click_login_button(self):
        self.login_button.click()
"#;
